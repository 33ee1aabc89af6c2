use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use vellum_core::record::to_fields;
use vellum_core::{BlobRecord, BlobReference, DataError, MAX_BLOB_BYTES, RecordId};
use vellum_executor::RetryingExecutor;

use crate::config::BlobConfig;
use crate::types::{BlobContent, ResolvedBlob};

/// Stores binary assets as records of a size-limited document store.
///
/// Each blob becomes one base64 record in the configured collection and is
/// addressed by a [`BlobReference`]. Payloads over the per-record limit are
/// rejected before any remote call. All store access goes through the
/// shared [`RetryingExecutor`].
#[derive(Debug)]
pub struct BlobStore {
    executor: Arc<RetryingExecutor>,
    config: BlobConfig,
}

impl BlobStore {
    /// Create a blob store writing through `executor`.
    ///
    /// `config.max_bytes` may lower the limit but never raise it above
    /// [`MAX_BLOB_BYTES`], the per-record ceiling of the database.
    pub fn new(executor: Arc<RetryingExecutor>, mut config: BlobConfig) -> Self {
        if config.max_bytes > MAX_BLOB_BYTES {
            warn!(
                configured = config.max_bytes,
                limit = MAX_BLOB_BYTES,
                "blob size limit above record ceiling, clamping"
            );
            config.max_bytes = MAX_BLOB_BYTES;
        }
        Self { executor, config }
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Store `content` and return a reference to it.
    ///
    /// `logical_path` is kept on the record for bookkeeping only.
    ///
    /// # Errors
    ///
    /// - [`DataError::PayloadTooLarge`] when the decoded size exceeds the
    ///   limit; no remote call is made.
    /// - [`DataError::StorageUnavailable`] when every write attempt failed.
    /// - [`DataError::UploadFailed`] for any other write failure.
    #[instrument(skip(self, content), fields(content_type = %content.content_type()))]
    pub async fn store(
        &self,
        content: &BlobContent,
        logical_path: &str,
    ) -> Result<BlobReference, DataError> {
        let size = content.decoded_size();
        if size > self.config.max_bytes {
            debug!(size, limit = self.config.max_bytes, "rejecting oversize blob");
            return Err(DataError::PayloadTooLarge {
                size,
                limit: self.config.max_bytes,
            });
        }

        let record = BlobRecord {
            path: logical_path.to_owned(),
            content: content.encoded().to_owned(),
            content_type: content.content_type().to_owned(),
            uploaded_at: Some(Utc::now()),
        };
        let fields = to_fields(&record).map_err(|e| DataError::UploadFailed(e.to_string()))?;

        let collection = self.config.collection.as_str();
        let id = self
            .executor
            .execute(|db| {
                let fields = fields.clone();
                async move { db.add(collection, fields).await }
            })
            .await
            .map_err(|err| match err {
                DataError::StorageUnavailable { .. } => err,
                other => DataError::UploadFailed(other.to_string()),
            })?;

        let reference = BlobReference::new(id);
        info!(%reference, size, "blob stored");
        Ok(reference)
    }

    /// Parse a `data:` URI and store its payload.
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidDataUri`] for malformed input, otherwise as
    /// [`BlobStore::store`].
    pub async fn store_data_uri(
        &self,
        data_uri: &str,
        logical_path: &str,
    ) -> Result<BlobReference, DataError> {
        let content = BlobContent::from_data_uri(data_uri)?;
        self.store(&content, logical_path).await
    }

    /// Resolve a reference string to displayable content.
    ///
    /// Strings that do not use the internal scheme are external URLs and are
    /// returned unchanged. Internal references resolve to a
    /// `data:<mime>;base64,<payload>` URI built from a single fetch.
    ///
    /// # Errors
    ///
    /// - [`DataError::BlobNotFound`] when no record exists for the reference.
    /// - [`DataError::StorageUnavailable`] when every read attempt failed.
    #[instrument(skip(self))]
    pub async fn resolve(&self, reference: &str) -> Result<String, DataError> {
        if !BlobReference::is_internal(reference) {
            return Ok(reference.to_owned());
        }
        let parsed = BlobReference::parse(reference)
            .ok_or_else(|| DataError::BlobNotFound(reference.to_owned()))?;
        let record = self.load(parsed.record_id()).await?;
        Ok(record.to_data_uri())
    }

    /// Fetch and decode the blob behind `reference`.
    ///
    /// # Errors
    ///
    /// As [`BlobStore::resolve`], plus [`DataError::Serialization`] when the
    /// stored payload is not valid base64.
    pub async fn fetch(&self, reference: &BlobReference) -> Result<ResolvedBlob, DataError> {
        let record = self.load(reference.record_id()).await?;
        ResolvedBlob::decode(reference.clone(), record)
    }

    async fn load(&self, id: &RecordId) -> Result<BlobRecord, DataError> {
        let collection = self.config.collection.as_str();
        let doc = self
            .executor
            .execute(|db| async move { db.get(collection, id).await })
            .await?
            .ok_or_else(|| DataError::BlobNotFound(id.to_string()))?;
        Ok(doc.decode::<BlobRecord>()?.data)
    }
}
