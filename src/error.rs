// ─── Error ──────────────────────────────────────────────────────────────────
use thiserror::Error;

/// A 0-based source position in imported text. Displayed 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} column {}", self.line + 1, self.column + 1)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not a valid rdt or bin file")]
    Format(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("too many records")]
    CapacityExceeded,
    #[error("{pos}: {msg}")]
    Grammar { pos: Position, msg: String },
    #[error("{0}")]
    Validation(String),
    #[error("internal inconsistency: {0}")]
    Consistency(String),
}

impl Error {
    pub fn grammar(pos: Position, msg: impl Into<String>) -> Error {
        Error::Grammar {
            pos,
            msg: msg.into(),
        }
    }
}
