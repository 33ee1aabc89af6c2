use std::time::Duration;

use crate::retry::RetryStrategy;

/// Configuration for the [`RetryingExecutor`](crate::RetryingExecutor).
///
/// # Examples
///
/// ```
/// use vellum_executor::ExecutorConfig;
///
/// let config = ExecutorConfig::default();
/// assert_eq!(config.max_attempts, 3);
/// assert!(config.attempt_timeout.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Total attempts per operation, including the first. Values below 1
    /// are treated as 1.
    pub max_attempts: u32,
    /// Strategy used to compute the delay between attempts.
    pub retry_strategy: RetryStrategy,
    /// Optional wall-clock limit for a single attempt. An attempt that runs
    /// past it counts as failed. `None` means attempts are unbounded and the
    /// only limit is the attempt count.
    pub attempt_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_strategy: RetryStrategy::default(),
            attempt_timeout: None,
        }
    }
}
