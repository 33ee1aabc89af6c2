use thiserror::Error;

/// Errors raised by a document store backend.
///
/// Absence of a document is not an error: lookups return `None` and
/// mutations report whether the target existed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
