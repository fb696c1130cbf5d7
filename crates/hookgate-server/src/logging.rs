//! Logging bootstrap
//!
//! Installs a `tracing` subscriber once per process. `RUST_LOG`, when set,
//! takes precedence over the configured level.

use hookgate_config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(config: &LoggingConfig) -> String {
    format!("{},hyper=warn,reqwest=warn", config.level)
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(config))
            .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!("Logging initialized with level: {}", config.level);
    Ok(())
}
