use std::sync::Arc;

use chrono::{DateTime, Utc};

use vellum_core::{DataError, Record};

/// Lifecycle of a collection accessor's current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// No fetch has been started.
    Idle,
    /// A fetch for the current scope is in flight. Records and error from the
    /// previous fetch are still available.
    Loading,
    /// The last fetch for the current scope succeeded.
    Ready,
    /// The last fetch for the current scope failed.
    Failed,
}

/// Client-side view of one (collection, query) pair.
///
/// Records are replaced wholesale on each successful fetch and shared behind
/// an `Arc`, so snapshots are cheap to clone.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub records: Arc<Vec<Record<T>>>,
    pub error: Option<DataError>,
    /// Generation of the scope this state belongs to. Bumped on every scope
    /// change and refresh; results for older generations are discarded.
    pub generation: u64,
    /// When the records were last replaced.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    pub(crate) fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            records: Arc::new(Vec::new()),
            error: None,
            generation: 0,
            fetched_at: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Returns `true` once a fetch for the current scope has settled.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, QueryStatus::Ready | QueryStatus::Failed)
    }

    pub fn records(&self) -> &[Record<T>] {
        &self.records
    }

    pub fn error(&self) -> Option<&DataError> {
        self.error.as_ref()
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            records: Arc::clone(&self.records),
            error: self.error.clone(),
            generation: self.generation,
            fetched_at: self.fetched_at,
        }
    }
}
