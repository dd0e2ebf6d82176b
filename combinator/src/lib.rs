//! Combinatory logic: statements of single-symbol atoms and application,
//! rewritten to normal form under a user-supplied [`Basis`] of combinators.

use thiserror::Error;

pub mod basis;
pub mod cancel;
pub mod catalog;
pub mod parser;
pub mod reducer;
pub mod tree;

pub use basis::{Basis, Combinator, DefinitionError};
pub use cancel::{CancelCause, CancelToken};
pub use parser::{parse, well_formed, SyntaxError};
pub use reducer::{normalize, rewrite, Options, Order, ReduceError, DEFAULT_MAX_FRAMES};
pub use tree::{Node, NodeId, Tree};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Reduce(#[from] ReduceError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
