use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expected '{expected}' at byte {pos}")]
    Expected { expected: char, pos: usize },
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("empty path")]
    EmptyPath,
    #[error("trailing input after term: {0:?}")]
    TrailingInput(String),
}

/// A runtime evaluation failure that is never surfaced to the subscriber as
/// a transport error (spec.md §9): it is logged and the term is treated as
/// non-matching.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("'cont'/'ncont' applied to a non-string value at path {0}")]
    ContOnNonString(String),
}
