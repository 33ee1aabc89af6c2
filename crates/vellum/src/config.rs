use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use vellum_blob::BlobConfig;
use vellum_core::MAX_BLOB_BYTES;
use vellum_executor::{ExecutorConfig, RetryStrategy};

use crate::error::ConfigError;

/// Top-level configuration for the data layer, loaded from a TOML file.
///
/// Every section is optional; an empty file yields the defaults.
///
/// # Example
///
/// ```toml
/// [store]
/// backend = "memory"
///
/// [executor]
/// max_attempts = 5
/// retry_delay_ms = 500
///
/// [blob]
/// collection = "files"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct VellumConfig {
    /// Document store backend selection.
    #[serde(default)]
    pub store: StoreConfig,
    /// Retry behaviour for every remote call.
    #[serde(default)]
    pub executor: ExecutorSection,
    /// Blob storage settings.
    #[serde(default)]
    pub blob: BlobConfig,
}

impl VellumConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for values outside their allowed range.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.executor.validate()?;
        if config.blob.max_bytes > MAX_BLOB_BYTES {
            return Err(ConfigError::Invalid(format!(
                "blob.max_bytes {} exceeds the record ceiling of {MAX_BLOB_BYTES} bytes",
                config.blob.max_bytes
            )));
        }
        Ok(config)
    }
}

/// Configuration for the document store backend.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Which backend to use. Only `"memory"` ships with this crate.
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

/// Retry overrides. Unset fields keep the [`ExecutorConfig`] defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutorSection {
    /// Total attempts per operation, including the first.
    pub max_attempts: Option<u32>,
    /// Backoff curve: `"linear"` (default), `"exponential"` or `"constant"`.
    pub strategy: Option<String>,
    /// Base delay between attempts in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Upper bound on a single delay in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Per-attempt timeout in milliseconds. Unset means no timeout.
    pub attempt_timeout_ms: Option<u64>,
}

impl ExecutorSection {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.strategy.as_deref() {
            None | Some("linear" | "exponential" | "constant") => Ok(()),
            Some(other) => Err(ConfigError::Invalid(format!(
                "unknown retry strategy `{other}`"
            ))),
        }
    }

    /// Build the runtime executor configuration.
    pub fn to_executor_config(&self) -> ExecutorConfig {
        let mut config = ExecutorConfig::default();
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }

        let (default_delay, default_max) = match &config.retry_strategy {
            RetryStrategy::Linear { delay, max } => (*delay, *max),
            RetryStrategy::Exponential { base, max, .. } => (*base, *max),
            RetryStrategy::Constant { delay } => (*delay, *delay),
        };
        let delay = self.retry_delay_ms.map_or(default_delay, Duration::from_millis);
        let max = self.max_delay_ms.map_or(default_max, Duration::from_millis);

        config.retry_strategy = match self.strategy.as_deref() {
            Some("exponential") => RetryStrategy::Exponential {
                base: delay,
                max,
                multiplier: 2.0,
            },
            Some("constant") => RetryStrategy::Constant { delay },
            _ => RetryStrategy::Linear { delay, max },
        };
        config.attempt_timeout = self.attempt_timeout_ms.map(Duration::from_millis);
        config
    }
}
