use std::sync::Arc;

use vellum_store::DynDocumentStore;
use vellum_store_memory::MemoryDocumentStore;

use crate::config::StoreConfig;
use crate::error::ConfigError;

/// Build the document store backend named in the configuration.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedBackend`] for unknown backend names.
pub fn create_store(config: &StoreConfig) -> Result<DynDocumentStore, ConfigError> {
    match config.backend.as_str() {
        "memory" => {
            tracing::info!("using in-memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        other => Err(ConfigError::UnsupportedBackend(other.to_owned())),
    }
}
