use std::sync::Arc;

use async_trait::async_trait;

use vellum_core::{Document, Fields, Query, RecordId};

use crate::error::StoreError;

/// Connection handle to a remote document database.
///
/// A database is a set of named collections holding schema-less documents.
/// The handle is shared by every component and must be safe for concurrent
/// use; all mutation happens on the server side.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query against a collection and return matching documents in
    /// query order.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Fetch a single document. Returns `None` if it does not exist.
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError>;

    /// Add a document and return the identifier the store assigned to it.
    async fn add(&self, collection: &str, fields: Fields) -> Result<RecordId, StoreError>;

    /// Merge `fields` into an existing document, leaving other fields
    /// untouched. Returns `false` if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> Result<bool, StoreError>;

    /// Delete a document. Returns `true` if the document existed.
    async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError>;
}

/// Shared, type-erased connection handle.
pub type DynDocumentStore = Arc<dyn DocumentStore>;
