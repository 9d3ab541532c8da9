//! Error types for the shared data model

use thiserror::Error;

/// Result type alias for field path operations
pub type Result<T> = std::result::Result<T, FieldPathError>;

/// Errors raised while parsing a field path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldPathError {
    #[error("field path is empty")]
    Empty,

    #[error("empty segment in field path '{path}' at offset {offset}")]
    EmptySegment { path: String, offset: usize },

    #[error("unterminated bracket in field path '{path}'")]
    UnterminatedBracket { path: String },

    #[error("invalid index '{index}' in field path '{path}'")]
    InvalidIndex { path: String, index: String },

    #[error("unexpected character '{found}' in field path '{path}' at offset {offset}")]
    UnexpectedCharacter {
        path: String,
        found: char,
        offset: usize,
    },
}
