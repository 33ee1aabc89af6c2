use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use vellum_core::{Document, Fields, Query, RecordId};
use vellum_store::error::StoreError;
use vellum_store::store::DocumentStore;

use crate::eval;

/// A stored document plus its insertion sequence number.
#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    fields: Fields,
}

/// One collection's documents.
#[derive(Debug, Default)]
struct Collection {
    next_seq: u64,
    docs: HashMap<RecordId, Entry>,
}

impl Collection {
    /// Snapshot of every document in insertion order.
    fn ordered(&self) -> Vec<Document> {
        let mut entries: Vec<(&RecordId, &Entry)> = self.docs.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(id, entry)| Document::new(id.clone(), entry.fields.clone()))
            .collect()
    }
}

/// In-memory [`DocumentStore`] backed by a [`DashMap`] of collections.
///
/// Identifiers are UUIDv7 strings. Queries are evaluated locally over a
/// snapshot of the collection; documents without an explicit ordering come
/// back in insertion order.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
}

impl MemoryDocumentStore {
    /// Create a new, empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |c| c.docs.len())
    }

    /// Returns `true` if `collection` holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

/// Merge `patch` into `target`. Dotted keys (`"location.type"`) address
/// nested objects, creating intermediate objects as needed.
fn merge_fields(target: &mut Fields, patch: Fields) {
    'patch: for (key, value) in patch {
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(last) = segments.pop() else {
            continue;
        };
        let mut current = &mut *target;
        for segment in segments {
            let slot = current
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Fields::new()));
            if !slot.is_object() {
                *slot = Value::Object(Fields::new());
            }
            let Some(next) = slot.as_object_mut() else {
                continue 'patch;
            };
            current = next;
        }
        current.insert(last.to_owned(), value);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .collections
            .get(collection)
            .map(|c| c.ordered())
            .unwrap_or_default();
        Ok(eval::apply(query, docs))
    }

    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
        Ok(self.collections.get(collection).and_then(|c| {
            c.docs
                .get(id)
                .map(|entry| Document::new(id.clone(), entry.fields.clone()))
        }))
    }

    async fn add(&self, collection: &str, mut fields: Fields) -> Result<RecordId, StoreError> {
        fields.remove("id");
        let id = RecordId::new(uuid::Uuid::now_v7().to_string());
        let mut coll = self.collections.entry(collection.to_owned()).or_default();
        let seq = coll.next_seq;
        coll.next_seq += 1;
        coll.docs.insert(id.clone(), Entry { seq, fields });
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        mut fields: Fields,
    ) -> Result<bool, StoreError> {
        fields.remove("id");
        let Some(mut coll) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        match coll.docs.get_mut(id) {
            Some(entry) => {
                merge_fields(&mut entry.fields, fields);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError> {
        Ok(self
            .collections
            .get_mut(collection)
            .is_some_and(|mut c| c.docs.remove(id).is_some()))
    }
}
