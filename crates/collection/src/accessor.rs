use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use vellum_core::record::to_fields;
use vellum_core::{DataError, Document, Query, Record, RecordId};
use vellum_executor::RetryingExecutor;

use crate::state::{QueryState, QueryStatus};

/// The constraint set an accessor is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub collection: String,
    pub query: Query,
}

impl Scope {
    pub fn new(collection: impl Into<String>, query: Query) -> Self {
        Self {
            collection: collection.into(),
            query,
        }
    }
}

/// Reactive read/write access to one collection.
///
/// The accessor keeps a [`QueryState`] for its current [`Scope`] and
/// refetches whenever the scope changes. While a fetch is in flight the
/// previous records and error stay visible with status
/// [`QueryStatus::Loading`]. Each fetch is tagged with a generation; a result
/// arriving after a newer scope change or refresh is dropped, so a slow
/// response for an old query can never overwrite a newer one.
///
/// Writes (`add`, `update`, `remove`) go straight to the store and leave the
/// cached records alone; call [`CollectionAccessor::refresh`] to see them.
///
/// Clones share the same scope and state.
pub struct CollectionAccessor<T> {
    executor: Arc<RetryingExecutor>,
    scope: Arc<Mutex<Scope>>,
    state: Arc<watch::Sender<QueryState<T>>>,
}

impl<T> Clone for CollectionAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            scope: Arc::clone(&self.scope),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for CollectionAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionAccessor")
            .field("scope", &self.scope())
            .field("status", &self.state.borrow().status)
            .finish_non_exhaustive()
    }
}

impl<T> CollectionAccessor<T> {
    /// Current scope.
    pub fn scope(&self) -> Scope {
        self.scope.lock().clone()
    }

    pub fn collection(&self) -> String {
        self.scope().collection
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Bump the generation and enter `Loading`, keeping the previous records
    /// and error. Callers hold the scope lock so the newest generation always
    /// pairs with the newest scope.
    fn begin_fetch(&self, scope: &Scope) -> (u64, Scope) {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = QueryStatus::Loading;
            generation = state.generation;
        });
        (generation, scope.clone())
    }

    fn begin_refetch(&self) -> (u64, Scope) {
        let scope = self.scope.lock();
        self.begin_fetch(&scope)
    }
}

impl<T> CollectionAccessor<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Create an accessor in the [`QueryStatus::Idle`] state without fetching.
    pub fn new(executor: Arc<RetryingExecutor>, collection: impl Into<String>, query: Query) -> Self {
        Self {
            executor,
            scope: Arc::new(Mutex::new(Scope::new(collection, query))),
            state: Arc::new(watch::Sender::new(QueryState::idle())),
        }
    }

    /// Create an accessor and start fetching immediately.
    ///
    /// Must be called within a Tokio runtime.
    pub fn open(executor: Arc<RetryingExecutor>, collection: impl Into<String>, query: Query) -> Self {
        let accessor = Self::new(executor, collection, query);
        accessor.reload();
        accessor
    }

    /// Switch to a new scope and refetch. Returns `false` and does nothing if
    /// the scope is unchanged.
    pub fn set_scope(&self, collection: impl Into<String>, query: Query) -> bool {
        let next = Scope::new(collection, query);
        self.rescope(|scope| *scope = next)
    }

    /// Replace the query constraints, keeping the collection.
    pub fn set_query(&self, query: Query) -> bool {
        self.rescope(|scope| scope.query = query)
    }

    /// Point the accessor at another collection, keeping the query.
    pub fn set_collection(&self, collection: impl Into<String>) -> bool {
        let collection = collection.into();
        self.rescope(|scope| scope.collection = collection)
    }

    /// Apply `change` to the scope under one lock and refetch if it changed.
    fn rescope(&self, change: impl FnOnce(&mut Scope)) -> bool {
        let (generation, scope) = {
            let mut current = self.scope.lock();
            let mut next = current.clone();
            change(&mut next);
            if *current == next {
                return false;
            }
            *current = next;
            self.begin_fetch(&current)
        };
        self.spawn_fetch(generation, scope);
        true
    }

    /// Start a background refetch of the current scope.
    pub fn reload(&self) -> JoinHandle<()> {
        let (generation, scope) = self.begin_refetch();
        self.spawn_fetch(generation, scope)
    }

    /// Refetch the current scope and wait for the result.
    ///
    /// The outcome is published to subscribers as well as returned, unless a
    /// newer scope change superseded this fetch in the meantime.
    ///
    /// # Errors
    ///
    /// [`DataError::StorageUnavailable`] when every attempt failed, or
    /// [`DataError::Serialization`] when a document does not decode as `T`.
    pub async fn refresh(&self) -> Result<(), DataError> {
        let (generation, scope) = self.begin_refetch();
        fetch(&self.executor, &self.state, generation, &scope).await
    }

    fn spawn_fetch(&self, generation: u64, scope: Scope) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(err) = fetch(&executor, &state, generation, &scope).await {
                debug!(collection = %scope.collection, generation, error = %err, "background fetch failed");
            }
        })
    }

    /// Add a record to the current collection and return its identifier.
    ///
    /// # Errors
    ///
    /// [`DataError::Serialization`] if `record` is not a JSON object, or
    /// [`DataError::StorageUnavailable`] when every attempt failed.
    #[instrument(skip(self, record))]
    pub async fn add<R>(&self, record: &R) -> Result<RecordId, DataError>
    where
        R: Serialize + ?Sized,
    {
        let fields = to_fields(record)?;
        let collection = self.collection();
        let collection = collection.as_str();
        let id = self
            .executor
            .execute(|db| {
                let fields = fields.clone();
                async move { db.add(collection, fields).await }
            })
            .await?;
        debug!(collection, %id, "record added");
        Ok(id)
    }

    /// Merge the fields of `patch` into an existing record.
    ///
    /// Only the fields present in `patch` are written; the rest of the
    /// record is untouched.
    ///
    /// # Errors
    ///
    /// [`DataError::RecordNotFound`] if `id` does not exist,
    /// [`DataError::Serialization`] if `patch` is not a JSON object, or
    /// [`DataError::StorageUnavailable`] when every attempt failed.
    #[instrument(skip(self, patch))]
    pub async fn update<P>(&self, id: &RecordId, patch: &P) -> Result<(), DataError>
    where
        P: Serialize + ?Sized,
    {
        let fields = to_fields(patch)?;
        let collection = self.collection();
        let collection_ref = collection.as_str();
        let existed = self
            .executor
            .execute(|db| {
                let fields = fields.clone();
                async move { db.update(collection_ref, id, fields).await }
            })
            .await?;
        if existed {
            Ok(())
        } else {
            Err(DataError::RecordNotFound {
                collection,
                id: id.to_string(),
            })
        }
    }

    /// Delete a record. Removing an absent record is not an error.
    ///
    /// # Errors
    ///
    /// [`DataError::StorageUnavailable`] when every attempt failed.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &RecordId) -> Result<(), DataError> {
        let collection = self.collection();
        let collection = collection.as_str();
        let existed = self
            .executor
            .execute(|db| async move { db.delete(collection, id).await })
            .await?;
        if !existed {
            debug!(collection, %id, "remove of absent record");
        }
        Ok(())
    }
}

/// Run the query for `scope` and publish the outcome if `generation` is still
/// current.
async fn fetch<T>(
    executor: &RetryingExecutor,
    state: &watch::Sender<QueryState<T>>,
    generation: u64,
    scope: &Scope,
) -> Result<(), DataError>
where
    T: DeserializeOwned,
{
    let result = executor
        .execute(|db| async move { db.query(&scope.collection, &scope.query).await })
        .await
        .and_then(|docs| {
            docs.into_iter()
                .map(Document::decode::<T>)
                .collect::<Result<Vec<Record<T>>, DataError>>()
        });
    let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);

    let published = state.send_if_modified(|current| {
        if current.generation != generation {
            return false;
        }
        match result {
            Ok(records) => {
                current.records = Arc::new(records);
                current.error = None;
                current.status = QueryStatus::Ready;
                current.fetched_at = Some(Utc::now());
            }
            Err(err) => {
                current.error = Some(err);
                current.status = QueryStatus::Failed;
            }
        }
        true
    });

    if published {
        debug!(collection = %scope.collection, generation, "query state updated");
    } else {
        debug!(collection = %scope.collection, generation, "discarding superseded query result");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use vellum_core::{Fields, FilterOp};
    use vellum_executor::{ExecutorConfig, RetryStrategy};
    use vellum_store::testing::FlakyStore;
    use vellum_store::{DocumentStore, StoreError};
    use vellum_store_memory::MemoryDocumentStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Event {
        title: String,
        status: String,
        capacity: u32,
    }

    fn event(title: &str, status: &str) -> Event {
        Event {
            title: title.into(),
            status: status.into(),
            capacity: 50,
        }
    }

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            max_attempts: 3,
            retry_strategy: RetryStrategy::Constant {
                delay: Duration::from_millis(1),
            },
            attempt_timeout: None,
        }
    }

    fn executor_over(store: Arc<dyn DocumentStore>) -> Arc<RetryingExecutor> {
        Arc::new(RetryingExecutor::new(store, fast_config()))
    }

    async fn seeded() -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        for (title, status) in [
            ("Kickoff", "Published"),
            ("Draft session", "Draft"),
            ("Summit", "Published"),
        ] {
            let fields = to_fields(&event(title, status)).unwrap();
            store.add("events", fields).await.unwrap();
        }
        store
    }

    async fn settled<T: Send + Sync>(rx: &mut watch::Receiver<QueryState<T>>) -> QueryState<T> {
        rx.wait_for(QueryState::is_settled)
            .await
            .expect("accessor dropped")
            .clone()
    }

    fn titles(state: &QueryState<Event>) -> Vec<String> {
        state.records().iter().map(|r| r.data.title.clone()).collect()
    }

    /// Store that delays queries by the number of seconds in their limit.
    struct SlowQueryStore {
        inner: MemoryDocumentStore,
    }

    #[async_trait]
    impl DocumentStore for SlowQueryStore {
        async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
            let secs = query.limit.unwrap_or(0) as u64;
            tokio::time::sleep(Duration::from_secs(secs)).await;
            self.inner.query(collection, query).await
        }

        async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn add(&self, collection: &str, fields: Fields) -> Result<RecordId, StoreError> {
            self.inner.add(collection, fields).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &RecordId,
            fields: Fields,
        ) -> Result<bool, StoreError> {
            self.inner.update(collection, id, fields).await
        }

        async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError> {
            self.inner.delete(collection, id).await
        }
    }

    #[tokio::test]
    async fn new_accessor_is_idle() {
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(seeded().await), "events", Query::new());
        let state = accessor.state();
        assert_eq!(state.status, QueryStatus::Idle);
        assert_eq!(state.generation, 0);
    }

    #[tokio::test]
    async fn open_fetches_into_ready_state() {
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::open(executor_over(seeded().await), "events", Query::new());
        let mut rx = accessor.subscribe();
        let state = settled(&mut rx).await;

        assert_eq!(state.status, QueryStatus::Ready);
        assert_eq!(titles(&state), vec!["Kickoff", "Draft session", "Summit"]);
        assert!(state.records().iter().all(|r| !r.id.is_empty()));
        assert!(state.fetched_at.is_some());
    }

    #[tokio::test]
    async fn set_query_refetches_with_new_constraints() {
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(seeded().await), "events", Query::new());
        accessor.refresh().await.unwrap();

        assert!(accessor.set_query(Query::new().where_eq("status", "Published")));
        let mut rx = accessor.subscribe();
        let state = settled(&mut rx).await;
        assert_eq!(titles(&state), vec!["Kickoff", "Summit"]);
        assert_eq!(state.generation, 2);
    }

    #[tokio::test]
    async fn unchanged_scope_is_a_no_op() {
        let query = Query::new().filter("capacity", FilterOp::Ge, json!(10));
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(seeded().await), "events", query.clone());
        accessor.refresh().await.unwrap();

        assert!(!accessor.set_query(query));
        assert!(!accessor.set_collection("events"));
        assert_eq!(accessor.state().generation, 1);
        assert_eq!(accessor.state().status, QueryStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn previous_records_stay_visible_while_loading() {
        let store = Arc::new(SlowQueryStore {
            inner: MemoryDocumentStore::new(),
        });
        for title in ["a", "b", "c"] {
            store
                .add("events", to_fields(&event(title, "Published")).unwrap())
                .await
                .unwrap();
        }
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(store), "events", Query::new());
        accessor.refresh().await.unwrap();
        assert_eq!(accessor.state().records().len(), 3);

        // Two-second query: inspect the state before it lands.
        accessor.set_query(Query::new().limit(2));
        tokio::time::sleep(Duration::from_millis(500)).await;
        let state = accessor.state();
        assert!(state.is_loading());
        assert_eq!(titles(&state), vec!["a", "b", "c"]);

        let mut rx = accessor.subscribe();
        let state = settled(&mut rx).await;
        assert_eq!(titles(&state), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_for_old_query_is_discarded() {
        let store = Arc::new(SlowQueryStore {
            inner: MemoryDocumentStore::new(),
        });
        for title in ["a", "b", "c", "d", "e"] {
            store
                .add("events", to_fields(&event(title, "Published")).unwrap())
                .await
                .unwrap();
        }
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(store), "events", Query::new());

        // Old query takes 5s, new query 1s.
        accessor.set_query(Query::new().limit(5));
        let old = accessor.reload();
        accessor.set_query(Query::new().limit(1));

        let mut rx = accessor.subscribe();
        let state = settled(&mut rx).await;
        assert_eq!(titles(&state), vec!["a"]);

        // Let the slow fetch finish; it must not clobber the newer result.
        old.await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = accessor.state();
        assert_eq!(state.status, QueryStatus::Ready);
        assert_eq!(titles(&state), vec!["a"]);
        assert_eq!(state.generation, 3);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_records() {
        let flaky = Arc::new(FlakyStore::new(seeded().await, 0));
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(flaky.clone()), "events", Query::new());
        accessor.refresh().await.unwrap();

        flaky.fail_next(3);
        let err = accessor.refresh().await.unwrap_err();
        assert!(matches!(err, DataError::StorageUnavailable { attempts: 3, .. }));

        let state = accessor.state();
        assert_eq!(state.status, QueryStatus::Failed);
        assert_eq!(state.records().len(), 3);
        assert_eq!(state.error(), Some(&err));

        // A later success clears the error.
        accessor.refresh().await.unwrap();
        let state = accessor.state();
        assert_eq!(state.status, QueryStatus::Ready);
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn undecodable_documents_fail_the_fetch() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .add("events", json!({"title": 42}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(store), "events", Query::new());
        let err = accessor.refresh().await.unwrap_err();
        assert!(matches!(err, DataError::Serialization(_)));
        assert_eq!(accessor.state().status, QueryStatus::Failed);
    }

    #[tokio::test]
    async fn add_does_not_touch_cached_records() {
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(seeded().await), "events", Query::new());
        accessor.refresh().await.unwrap();

        let id = accessor.add(&event("Gala", "Draft")).await.unwrap();
        assert_eq!(accessor.state().records().len(), 3);

        accessor.refresh().await.unwrap();
        let state = accessor.state();
        assert_eq!(state.records().len(), 4);
        assert_eq!(state.records()[3].id, id);
        assert_eq!(state.records()[3].data.title, "Gala");
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = Arc::new(MemoryDocumentStore::new());
        let accessor: CollectionAccessor<serde_json::Value> =
            CollectionAccessor::new(executor_over(store.clone()), "items", Query::new());
        let id = accessor.add(&json!({"a": 1, "b": 2})).await.unwrap();

        accessor.update(&id, &json!({"b": 3})).await.unwrap();

        let doc = store.get("items", &id).await.unwrap().unwrap();
        assert_eq!(serde_json::Value::Object(doc.fields), json!({"a": 1, "b": 3}));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_retried() {
        let flaky = Arc::new(FlakyStore::new(Arc::new(MemoryDocumentStore::new()), 0));
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(flaky.clone()), "events", Query::new());

        let err = accessor
            .update(&RecordId::from("ghost"), &json!({"status": "Cancelled"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DataError::RecordNotFound {
                collection: "events".into(),
                id: "ghost".into(),
            }
        );
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = seeded().await;
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(store.clone()), "events", Query::new());
        accessor.refresh().await.unwrap();
        let id = accessor.state().records()[0].id.clone();

        accessor.remove(&id).await.unwrap();
        accessor.remove(&id).await.unwrap();
        assert_eq!(store.len("events"), 2);
    }

    #[tokio::test]
    async fn writes_surface_storage_unavailable() {
        let flaky = Arc::new(FlakyStore::always_failing(Arc::new(
            MemoryDocumentStore::new(),
        )));
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(flaky), "events", Query::new());

        let err = accessor.add(&event("x", "Draft")).await.unwrap_err();
        assert!(err.is_transient());
        let err = accessor.remove(&RecordId::from("x")).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn partial_scope_changes_from_clones_compose() {
        let store = seeded().await;
        store
            .add("reports", to_fields(&event("Annual", "Published")).unwrap())
            .await
            .unwrap();
        store
            .add("reports", to_fields(&event("Draft memo", "Draft")).unwrap())
            .await
            .unwrap();
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(store), "events", Query::new());
        let other = accessor.clone();

        let tasks = [
            tokio::spawn({
                let accessor = accessor.clone();
                async move { accessor.set_collection("reports") }
            }),
            tokio::spawn(async move {
                other.set_query(Query::new().where_eq("status", "Published"))
            }),
        ];
        for task in tasks {
            assert!(task.await.unwrap());
        }

        let scope = accessor.scope();
        assert_eq!(scope.collection, "reports");
        assert_eq!(scope.query, Query::new().where_eq("status", "Published"));

        accessor.refresh().await.unwrap();
        assert_eq!(titles(&accessor.state()), vec!["Annual"]);
        assert_eq!(accessor.state().generation, 3);
    }

    #[tokio::test]
    async fn set_collection_switches_source() {
        let store = seeded().await;
        store
            .add("reports", to_fields(&event("Annual", "Published")).unwrap())
            .await
            .unwrap();
        let accessor: CollectionAccessor<Event> =
            CollectionAccessor::new(executor_over(store), "events", Query::new());
        accessor.refresh().await.unwrap();

        assert!(accessor.set_collection("reports"));
        let mut rx = accessor.subscribe();
        let state = settled(&mut rx).await;
        assert_eq!(titles(&state), vec!["Annual"]);
        assert_eq!(accessor.collection(), "reports");
    }
}
