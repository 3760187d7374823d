//! Error types for wxhist-types.

use thiserror::Error;

/// Errors that can occur when parsing identifiers used by the rollup.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Unknown operator token (e.g. `"MAX"`, `"AVG|MID"`).
    #[error("Unknown operator token: {0}")]
    UnknownOperator(String),

    /// Unknown measure set label (e.g. `"max"`, `"avg|mid"`).
    #[error("Unknown measure set: {0}")]
    UnknownMeasureSet(String),
}

/// Result type alias using wxhist-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
