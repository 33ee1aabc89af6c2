use std::sync::Arc;

use serde::de::DeserializeOwned;

use vellum_blob::{BlobConfig, BlobStore};
use vellum_collection::CollectionAccessor;
use vellum_core::Query;
use vellum_executor::{ExecutorConfig, RetryingExecutor};
use vellum_store::DynDocumentStore;

use crate::config::VellumConfig;
use crate::error::ConfigError;
use crate::store_factory::create_store;

/// One shared connection handle wired into every component.
///
/// Blob storage and every collection accessor created from a `DataLayer`
/// reach the store only through the same [`RetryingExecutor`].
#[derive(Debug, Clone)]
pub struct DataLayer {
    executor: Arc<RetryingExecutor>,
    blobs: Arc<BlobStore>,
}

impl DataLayer {
    pub fn new(store: DynDocumentStore, executor: ExecutorConfig, blob: BlobConfig) -> Self {
        let executor = Arc::new(RetryingExecutor::new(store, executor));
        let blobs = Arc::new(BlobStore::new(Arc::clone(&executor), blob));
        Self { executor, blobs }
    }

    /// Build the backend named in `config` and wire it up.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedBackend`] for unknown backends.
    pub fn from_config(config: &VellumConfig) -> Result<Self, ConfigError> {
        let store = create_store(&config.store)?;
        Ok(Self::new(
            store,
            config.executor.to_executor_config(),
            config.blob.clone(),
        ))
    }

    pub fn executor(&self) -> &Arc<RetryingExecutor> {
        &self.executor
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Open an accessor on `collection` and start its first fetch.
    ///
    /// Must be called within a Tokio runtime.
    pub fn collection<T>(&self, collection: impl Into<String>, query: Query) -> CollectionAccessor<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        CollectionAccessor::open(Arc::clone(&self.executor), collection, query)
    }
}
