pub mod blob;
pub mod error;
pub mod query;
pub mod record;

pub use blob::{BLOB_SCHEME, BlobRecord, BlobReference, MAX_BLOB_BYTES, decoded_len};
pub use error::DataError;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};
pub use record::{Document, Fields, Record, RecordId, to_fields};
