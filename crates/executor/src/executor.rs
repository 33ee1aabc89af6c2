use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use vellum_core::DataError;
use vellum_store::{DocumentStore, DynDocumentStore, StoreError};

use crate::config::ExecutorConfig;

/// Runs document store operations with bounded retry and backoff.
///
/// Every remote call in the layer goes through [`RetryingExecutor::execute`].
/// Any [`StoreError`] is treated as transient: the operation is re-run until
/// it succeeds or [`ExecutorConfig::max_attempts`] is reached, sleeping for
/// the configured [`RetryStrategy`](crate::RetryStrategy) delay in between.
/// Exhaustion yields [`DataError::StorageUnavailable`].
///
/// Operations report a missing document as a successful `None`/`false`, so
/// not-found outcomes never consume the retry budget.
pub struct RetryingExecutor {
    store: DynDocumentStore,
    config: ExecutorConfig,
}

impl RetryingExecutor {
    /// Create an executor over the shared connection handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use vellum_executor::{ExecutorConfig, RetryingExecutor};
    /// use vellum_store_memory::MemoryDocumentStore;
    ///
    /// let executor = RetryingExecutor::new(
    ///     Arc::new(MemoryDocumentStore::new()),
    ///     ExecutorConfig::default(),
    /// );
    /// assert_eq!(executor.config().max_attempts, 3);
    /// ```
    pub fn new(store: DynDocumentStore, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    /// Return a reference to the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `operation` against the store, retrying failed attempts.
    ///
    /// `operation` receives the connection handle and is called once per
    /// attempt, so it must be re-runnable; clone owned inputs inside it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::StorageUnavailable`] carrying the attempt count and
    /// the last underlying error once every attempt has failed.
    #[instrument(skip_all, fields(attempt))]
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, DataError>
    where
        F: FnMut(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error: Option<StoreError> = None;

        for attempt in 1..=max_attempts {
            tracing::Span::current().record("attempt", attempt);

            let call = operation(Arc::clone(&self.store));
            let result = match self.config.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(StoreError::Timeout(limit))),
                None => call.await,
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, max_attempts, "document store operation recovered");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt < max_attempts {
                        let delay = self.config.retry_strategy.delay_for(attempt - 1);
                        warn!(
                            attempt,
                            max_attempts,
                            error = %err,
                            delay_ms = %delay.as_millis(),
                            "document store operation failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            attempt,
                            max_attempts,
                            error = %err,
                            "document store operation failed, no attempts left"
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(DataError::StorageUnavailable {
            attempts: max_attempts,
            message: last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string()),
        })
    }
}

impl std::fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
