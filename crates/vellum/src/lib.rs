//! Retrying document-store access, blob storage inside size-limited records,
//! and reactive collection state.
//!
//! ```no_run
//! use vellum::{DataLayer, VellumConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! vellum::telemetry::init();
//! let config = VellumConfig::load("vellum.toml")?;
//! let layer = DataLayer::from_config(&config)?;
//!
//! let reference = layer
//!     .blobs()
//!     .store_data_uri("data:image/png;base64,iVBORw0KGgo=", "posters/launch.png")
//!     .await?;
//! let uri = layer.blobs().resolve(&reference.to_string()).await?;
//! assert!(uri.starts_with("data:image/png;base64,"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod layer;
pub mod store_factory;
pub mod telemetry;

pub use config::{ExecutorSection, StoreConfig, VellumConfig};
pub use error::ConfigError;
pub use layer::DataLayer;
pub use store_factory::create_store;

pub use vellum_blob::{BlobConfig, BlobContent, BlobStore, ResolvedBlob};
pub use vellum_collection::{CollectionAccessor, QueryState, QueryStatus, Scope};
pub use vellum_core::{
    BlobRecord, BlobReference, DataError, Direction, Document, Fields, Filter, FilterOp, OrderBy,
    Query, Record, RecordId,
};
pub use vellum_executor::{ExecutorConfig, RetryStrategy, RetryingExecutor};
pub use vellum_store::{DocumentStore, DynDocumentStore, StoreError};
pub use vellum_store_memory::MemoryDocumentStore;
