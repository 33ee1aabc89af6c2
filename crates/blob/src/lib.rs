pub mod config;
pub mod store;
pub mod types;

pub use config::BlobConfig;
pub use store::BlobStore;
pub use types::{BlobContent, ResolvedBlob};
