use std::path::PathBuf;

use rustyline::{error::ReadlineError, Editor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error<E> {
    #[error(transparent)]
    Readline(ReadlineError),
    #[error("Evaluation failed: {0:?}")]
    Evaluate(E),
}

/// What the driver does once a line has been evaluated.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Quit,
}

pub trait Repl {
    type Error: std::fmt::Debug;

    fn prompt(&self) -> String {
        ">> ".to_owned()
    }

    /// File the line history is loaded from and saved to.
    fn history(&self) -> Option<PathBuf> {
        None
    }

    fn evaluate(&mut self, input: &str) -> Result<Flow, Self::Error>;
}

/// Runs `repl` until end of input, an interrupt, or `Flow::Quit`.
///
/// A line ending in `\` is joined with the next one before evaluation.
pub fn start_repl<R: Repl>(mut repl: R) -> Result<(), Error<R::Error>> {
    let mut editor = Editor::<()>::new();
    let history = repl.history();
    if let Some(history) = &history {
        editor.load_history(history).ok();
    }
    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() {
            repl.prompt()
        } else {
            ".. ".to_owned()
        };
        match editor.readline(&prompt) {
            Ok(line) => {
                if let Some(head) = line.strip_suffix('\\') {
                    pending.push_str(head);
                    continue;
                }
                pending.push_str(&line);
                let input = std::mem::take(&mut pending);
                if input.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(input.as_str());
                let flow = repl.evaluate(&input).map_err(Error::Evaluate)?;
                if let Some(history) = &history {
                    editor.save_history(history).map_err(Error::Readline)?;
                }
                if flow == Flow::Quit {
                    println!("Bye!");
                    break Ok(());
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("Bye!");
                break Ok(());
            }
            Err(e) => break Err(Error::Readline(e)),
        }
    }
}
