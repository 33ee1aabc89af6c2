use thiserror::Error;

/// Errors surfaced by the data-access and blob-storage layer.
///
/// Every public operation either succeeds or fails with one of these kinds.
/// The type is `Clone` so a failed fetch can be kept in reactive query state
/// alongside the records it failed to replace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// Every configured attempt against the document store failed.
    #[error("document store unavailable after {attempts} attempts: {message}")]
    StorageUnavailable {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Message of the last underlying failure.
        message: String,
    },

    /// A blob payload exceeds the per-record size ceiling.
    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Decoded payload size, rounded up.
        size: u64,
        /// Maximum allowed decoded size.
        limit: u64,
    },

    /// No blob record exists for the referenced identifier.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// No record exists for the given identifier in the collection.
    #[error("record not found: {collection}/{id}")]
    RecordNotFound {
        /// Collection the lookup targeted.
        collection: String,
        /// Identifier that does not exist.
        id: String,
    },

    /// A blob write failed for a reason other than store unavailability.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Upload input was not a `data:<mime>;base64,<payload>` URI.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    /// A record could not be converted to or from its field map.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DataError {
    /// Returns `true` when the failure is expected to clear on its own and the
    /// caller may try again later.
    ///
    /// Only [`DataError::StorageUnavailable`] qualifies; every other kind is
    /// caller-fixable or permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
