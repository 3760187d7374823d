//! Error types for wxhist-core.
//!
//! Zero matching rows is never an error: the executor reports it as
//! [`AggregationOutcome::NothingToAggregate`](crate::AggregationOutcome).
//! Errors raised while processing one series or one station are logged by
//! the [`HistoryBuilder`](crate::HistoryBuilder) and do not abort the run.

/// Result type for wxhist-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building history.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Daily or historical store failure.
    #[error("Storage error: {0}")]
    Store(#[from] wxhist_store::Error),

    /// Station timezone could not be parsed.
    #[error("Invalid timezone '{timezone}': {message}")]
    InvalidTimezone { timezone: String, message: String },

    /// The local day window could not be computed.
    #[error("Invalid day window: {0}")]
    InvalidWindow(String),

    /// The run was cancelled.
    #[error("Run cancelled")]
    Cancelled,

    /// The run went past its deadline.
    #[error("Run deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Returns `true` if the error stopped a run early rather than failing it.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_conversion() {
        let err: Error = wxhist_store::Error::Unavailable("locked".into()).into();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(err.to_string(), "Storage error: Storage unavailable: locked");
        assert!(!err.is_interruption());
    }

    #[test]
    fn test_interruptions() {
        assert!(Error::Cancelled.is_interruption());
        assert!(Error::DeadlineExceeded.is_interruption());
    }
}
