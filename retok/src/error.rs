use crate::alloc::AllocError;
use thiserror::Error;

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    OutOfMemory(#[from] AllocError),
    #[error("range {start}+{length} is outside of a {len} byte pattern")]
    InputRange {
        start: usize,
        length: usize,
        len: usize,
    },
}

impl Error {
    /// Byte offset into the scanned pattern, for syntax errors only.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Syntax(err) => Some(err.offset),
            Error::OutOfMemory(_) | Error::InputRange { .. } => None,
        }
    }

    pub fn syntax_kind(&self) -> Option<SyntaxErrorKind> {
        match self {
            Error::Syntax(err) => Some(err.kind),
            Error::OutOfMemory(_) | Error::InputRange { .. } => None,
        }
    }

    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Error::OutOfMemory(_))
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("{kind} at byte {offset}")]
pub struct SyntaxError {
    pub offset: usize,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn new(offset: usize, kind: SyntaxErrorKind) -> Self {
        Self { offset, kind }
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    #[error("Unclosed character class")]
    UnterminatedCharClass,
    #[error("Quantifier bound does not fit in a machine word")]
    QuantifierOverflow,
    #[error("Malformed quantifier")]
    MalformedQuantifier,
    #[error("Unclosed quantifier")]
    UnterminatedQuantifier,
    #[error("Quantifier upper bound is smaller than its lower bound")]
    InvertedQuantifierRange,
    #[error("Escape at end of pattern")]
    UnterminatedEscape,
    #[error("Unbalanced parenthesis")]
    UnbalancedParenthesis,
}
