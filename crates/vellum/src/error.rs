use thiserror::Error;

/// Errors raised while loading configuration or wiring the data layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`VellumConfig`](crate::VellumConfig).
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configured store backend is not available.
    #[error("unsupported store backend: {0}")]
    UnsupportedBackend(String),
}
