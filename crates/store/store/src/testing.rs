use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::json;

use vellum_core::{Direction, Document, Fields, FilterOp, Query, RecordId};

use crate::error::StoreError;
use crate::store::{DocumentStore, DynDocumentStore};

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("test fields must be an object, got {other}"),
    }
}

/// Run the full document store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if the backend fails an operation outright. Behavioural
/// mismatches panic with a description of the failed expectation.
pub async fn run_store_conformance_tests(store: &dyn DocumentStore) -> Result<(), StoreError> {
    test_get_missing(store).await?;
    test_add_and_get(store).await?;
    test_update_merges(store).await?;
    test_update_missing(store).await?;
    test_delete(store).await?;
    test_query_filter(store).await?;
    test_query_order_and_limit(store).await?;
    test_collections_are_isolated(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let doc = store.get("conformance", &RecordId::from("missing")).await?;
    assert!(doc.is_none(), "get on missing id should return None");
    Ok(())
}

async fn test_add_and_get(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let id = store
        .add("conformance", fields(json!({"name": "Ada", "age": 36})))
        .await?;
    assert!(!id.is_empty(), "add should assign a non-empty id");

    let doc = store.get("conformance", &id).await?.expect("added document");
    assert_eq!(doc.id, id);
    assert_eq!(doc.fields["name"], "Ada");
    assert!(
        !doc.fields.contains_key("id"),
        "id must not be stored as a field"
    );

    let other = store
        .add("conformance", fields(json!({"name": "Grace"})))
        .await?;
    assert_ne!(id, other, "each add should assign a distinct id");
    Ok(())
}

async fn test_update_merges(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let id = store
        .add("conformance-update", fields(json!({"a": 1, "b": 2})))
        .await?;
    let existed = store
        .update("conformance-update", &id, fields(json!({"b": 3})))
        .await?;
    assert!(existed, "update of existing document should return true");

    let doc = store
        .get("conformance-update", &id)
        .await?
        .expect("updated document");
    assert_eq!(doc.fields["a"], 1, "untouched field must survive update");
    assert_eq!(doc.fields["b"], 3);
    Ok(())
}

async fn test_update_missing(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let existed = store
        .update(
            "conformance-update",
            &RecordId::from("nope"),
            fields(json!({"b": 3})),
        )
        .await?;
    assert!(!existed, "update of missing document should return false");
    let doc = store
        .get("conformance-update", &RecordId::from("nope"))
        .await?;
    assert!(doc.is_none(), "update must not create a document");
    Ok(())
}

async fn test_delete(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let id = store
        .add("conformance-delete", fields(json!({"x": true})))
        .await?;
    assert!(store.delete("conformance-delete", &id).await?);
    assert!(store.get("conformance-delete", &id).await?.is_none());
    assert!(
        !store.delete("conformance-delete", &id).await?,
        "delete on missing document should return false"
    );
    Ok(())
}

async fn test_query_filter(store: &dyn DocumentStore) -> Result<(), StoreError> {
    for (title, status) in [("a", "Draft"), ("b", "Published"), ("c", "Published")] {
        store
            .add(
                "conformance-query",
                fields(json!({"title": title, "status": status})),
            )
            .await?;
    }
    let query = Query::new().filter("status", FilterOp::Eq, json!("Published"));
    let docs = store.query("conformance-query", &query).await?;
    let titles: Vec<_> = docs.iter().map(|d| d.fields["title"].clone()).collect();
    assert_eq!(titles, vec![json!("b"), json!("c")]);
    Ok(())
}

async fn test_query_order_and_limit(store: &dyn DocumentStore) -> Result<(), StoreError> {
    for rank in [2, 5, 1, 4] {
        store
            .add("conformance-order", fields(json!({"rank": rank})))
            .await?;
    }
    let query = Query::new().order_by("rank", Direction::Desc).limit(3);
    let docs = store.query("conformance-order", &query).await?;
    let ranks: Vec<_> = docs.iter().map(|d| d.fields["rank"].clone()).collect();
    assert_eq!(ranks, vec![json!(5), json!(4), json!(2)]);
    Ok(())
}

async fn test_collections_are_isolated(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let docs = store.query("conformance-empty", &Query::new()).await?;
    assert!(docs.is_empty(), "unknown collection should query empty");
    Ok(())
}

/// Store wrapper that fails a configurable number of calls before delegating.
///
/// Every call is counted, failed or not, so tests can assert exactly how many
/// remote round trips an operation made.
pub struct FlakyStore {
    inner: DynDocumentStore,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyStore {
    /// Fail the first `failures` calls, then delegate to `inner`.
    pub fn new(inner: DynDocumentStore, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail every call.
    pub fn always_failing(inner: DynDocumentStore) -> Self {
        Self::new(inner, u32::MAX)
    }

    /// Number of calls made so far, including failed ones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fail the next `failures` calls.
    pub fn fail_next(&self, failures: u32) {
        self.failures_left.store(failures, Ordering::SeqCst);
    }

    fn attempt(&self) -> Result<(), StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(StoreError::Connection(format!(
                "injected failure on call {call}"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.attempt()?;
        self.inner.query(collection, query).await
    }

    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
        self.attempt()?;
        self.inner.get(collection, id).await
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<RecordId, StoreError> {
        self.attempt()?;
        self.inner.add(collection, fields).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> Result<bool, StoreError> {
        self.attempt()?;
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError> {
        self.attempt()?;
        self.inner.delete(collection, id).await
    }
}
