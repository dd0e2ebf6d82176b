use rpds::VectorSync;
use thiserror::Error;

use crate::{
    parser::{self, SyntaxError},
    reducer::{self, Options, ReduceError},
    tree::Tree,
};

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum DefinitionError {
    #[error("definition of `{name}` is malformed: {source}")]
    Syntax {
        name: char,
        #[source]
        source: SyntaxError,
    },
    #[error("parameter `{parameter}` of `{name}` appears more than once")]
    DuplicateParameter { name: char, parameter: char },
    #[error("`{0}` cannot name a combinator or a parameter")]
    ReservedSymbol(char),
}

/// A named rewrite rule: `name arguments... = definition`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Combinator {
    pub name: char,
    pub arguments: Vec<char>,
    pub definition: String,
}

impl Combinator {
    pub fn new(
        name: char,
        arguments: impl IntoIterator<Item = char>,
        definition: impl Into<String>,
    ) -> Result<Self, DefinitionError> {
        let arguments = arguments.into_iter().collect::<Vec<_>>();
        let definition = definition.into();
        for &symbol in std::iter::once(&name).chain(&arguments) {
            if symbol == '(' || symbol == ')' || symbol.is_whitespace() {
                return Err(DefinitionError::ReservedSymbol(symbol));
            }
        }
        for (i, parameter) in arguments.iter().enumerate() {
            if arguments[..i].contains(parameter) {
                return Err(DefinitionError::DuplicateParameter {
                    name,
                    parameter: *parameter,
                });
            }
        }
        parser::well_formed(&definition)
            .map_err(|source| DefinitionError::Syntax { name, source })?;
        Ok(Self {
            name,
            arguments,
            definition,
        })
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Whether the definition mentions nothing but the parameters.
    pub fn is_proper(&self) -> bool {
        self.definition
            .chars()
            .all(|c| c == '(' || c == ')' || self.arguments.contains(&c))
    }

    /// Reduces `statement` with this combinator as the only rule.
    pub fn transform(&self, statement: &str, options: &Options) -> crate::Result<String> {
        Basis::new().with(self.clone()).transform(statement, options)
    }
}

impl std::fmt::Display for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for argument in &self.arguments {
            write!(f, " {argument}")?;
        }
        write!(f, " = {}", self.definition)
    }
}

/// An ordered set of combinators. Earlier entries shadow later ones with the
/// same name.
///
/// Backed by a persistent vector: [`Basis::with`] shares structure with the
/// original instead of copying or mutating it, and a basis can be read from
/// several threads at once.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Basis {
    combinators: VectorSync<Combinator>,
}

impl Default for Basis {
    fn default() -> Self {
        Self::new()
    }
}

impl Basis {
    pub fn new() -> Self {
        Self {
            combinators: VectorSync::new_sync(),
        }
    }

    /// First combinator called `name`.
    pub fn find(&self, name: char) -> Option<&Combinator> {
        self.combinators.iter().find(|c| c.name == name)
    }

    /// A new basis with `combinator` appended; `self` is left untouched.
    pub fn with(&self, combinator: Combinator) -> Self {
        Self {
            combinators: self.combinators.push_back(combinator),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combinator> {
        self.combinators.iter()
    }

    pub fn len(&self) -> usize {
        self.combinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinators.is_empty()
    }

    /// Parses, normalizes and renders `statement`.
    pub fn transform(&self, statement: &str, options: &Options) -> crate::Result<String> {
        let tree = parser::parse(statement)?;
        let tree = self.reduce(tree, options)?;
        Ok(tree.to_string())
    }

    pub fn reduce(&self, tree: Tree, options: &Options) -> Result<Tree, ReduceError> {
        reducer::normalize(tree, self, options)
    }
}

impl FromIterator<Combinator> for Basis {
    fn from_iter<I: IntoIterator<Item = Combinator>>(iter: I) -> Self {
        let mut combinators = VectorSync::new_sync();
        for combinator in iter {
            combinators.push_back_mut(combinator);
        }
        Self { combinators }
    }
}
