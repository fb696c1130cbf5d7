use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8180;

/// Default total deadline for a single webhook call
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub routes: RouteConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut server = ServerConfig::default();
        if let Some(host) = non_empty(lookup("HOST")) {
            server.host = host;
        }
        if let Some(port) = non_empty(lookup("PORT")) {
            server.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid port number: {}", port)))?;
        }
        if let Some(secs) = non_empty(lookup("WEBHOOK_TIMEOUT_SECS")) {
            let secs: u64 = secs
                .parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", secs)))?;
            server.webhook_timeout = ServerConfig::webhook_timeout_from_secs(secs)?;
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = non_empty(lookup("LOG_LEVEL")) {
            logging.level = level.parse()?;
        }
        if let Some(json) = non_empty(lookup("LOG_JSON")) {
            logging.json = json
                .parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", json)))?;
        }

        Ok(Self {
            server,
            routes: RouteConfig::from_lookup(lookup)?,
            logging,
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub webhook_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            webhook_timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    /// A zero timeout would make every webhook call fail, so it is rejected
    pub fn webhook_timeout_from_secs(secs: u64) -> ConfigResult<Duration> {
        if secs == 0 {
            return Err(ConfigError::Validation(
                "WEBHOOK_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(Duration::from_secs(secs))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logical route names a webhook can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteName {
    Connect,
    Default,
    Disconnect,
}

impl RouteName {
    pub const ALL: [RouteName; 3] = [RouteName::Connect, RouteName::Default, RouteName::Disconnect];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteName::Connect => "connect",
            RouteName::Default => "default",
            RouteName::Disconnect => "disconnect",
        }
    }

    /// Environment variable holding the webhook URL for this route
    pub fn env_key(&self) -> &'static str {
        match self {
            RouteName::Connect => "CONNECT_ROUTE",
            RouteName::Default => "DEFAULT_ROUTE",
            RouteName::Disconnect => "DISCONNECT_ROUTE",
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RouteName {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.trim_start_matches('$').to_lowercase().as_str() {
            "connect" => Ok(RouteName::Connect),
            "default" => Ok(RouteName::Default),
            "disconnect" => Ok(RouteName::Disconnect),
            _ => Err(ConfigError::Validation(format!("Unknown route: {}", s))),
        }
    }
}

/// Static route name -> webhook URL mapping, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteConfig {
    routes: BTreeMap<RouteName, String>,
}

impl RouteConfig {
    /// Read `CONNECT_ROUTE`, `DEFAULT_ROUTE` and `DISCONNECT_ROUTE` from the environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = RouteConfigBuilder::default();
        for route in RouteName::ALL {
            if let Some(url) = lookup(route.env_key()) {
                builder = builder.route(route, url);
            }
        }
        builder.build()
    }

    pub fn builder() -> RouteConfigBuilder {
        RouteConfigBuilder::default()
    }

    /// Start a builder pre-filled with these routes, for layering overrides
    pub fn into_builder(self) -> RouteConfigBuilder {
        RouteConfigBuilder {
            routes: self.routes,
        }
    }

    /// Webhook URL for `route`, if one is configured
    pub fn resolve(&self, route: RouteName) -> Option<&str> {
        self.routes.get(&route).map(String::as_str)
    }

    /// Routes that have a webhook attached
    pub fn configured(&self) -> Vec<RouteName> {
        self.routes.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects route URLs and validates them once in `build`
#[derive(Debug, Default)]
pub struct RouteConfigBuilder {
    routes: BTreeMap<RouteName, String>,
}

impl RouteConfigBuilder {
    /// Attach a webhook URL; blank values leave the route disabled
    pub fn route(mut self, route: RouteName, url: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.trim();
        if url.is_empty() {
            self.routes.remove(&route);
        } else {
            self.routes.insert(route, url.to_string());
        }
        self
    }

    pub fn build(self) -> ConfigResult<RouteConfig> {
        for (route, url) in &self.routes {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "{} must be an http(s) URL, got: {}",
                    route.env_key(),
                    url
                )));
            }
        }
        Ok(RouteConfig {
            routes: self.routes,
        })
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
