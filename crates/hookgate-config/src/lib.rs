//! Process configuration for the hookgate WebSocket gateway.
//!
//! Everything is resolved once at startup from environment variables
//! (optionally overridden on the command line) and is immutable afterwards.

pub mod config;

pub use config::{
    Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, RouteConfig, RouteConfigBuilder,
    RouteName, ServerConfig, DEFAULT_PORT, DEFAULT_WEBHOOK_TIMEOUT_SECS,
};
