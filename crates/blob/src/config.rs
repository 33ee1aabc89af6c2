use serde::Deserialize;

use vellum_core::MAX_BLOB_BYTES;

/// Configuration for the [`BlobStore`](crate::BlobStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Collection that holds blob records.
    pub collection: String,
    /// Maximum decoded payload size in bytes.
    pub max_bytes: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            collection: "files".to_owned(),
            max_bytes: MAX_BLOB_BYTES,
        }
    }
}
