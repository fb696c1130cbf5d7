use clap::Parser;
use hookgate_config::{Config, LogLevel, RouteName, ServerConfig};
use hookgate_server::{logging::init_logging, run_server};

#[derive(Parser, Debug, Clone)]
#[command(name = "hookgate")]
#[command(about = "Local WebSocket gateway that forwards connection events to HTTP webhooks")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Bind address (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Webhook timeout in seconds (overrides WEBHOOK_TIMEOUT_SECS)
    #[arg(long)]
    webhook_timeout_secs: Option<u64>,

    /// Webhook for `$connect` (overrides CONNECT_ROUTE)
    #[arg(long)]
    connect_route: Option<String>,

    /// Webhook for `$default` (overrides DEFAULT_ROUTE)
    #[arg(long)]
    default_route: Option<String>,

    /// Webhook for `$disconnect` (overrides DISCONNECT_ROUTE)
    #[arg(long)]
    disconnect_route: Option<String>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Emit JSON log lines (overrides LOG_JSON)
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

impl Cli {
    /// Layer command line overrides on top of the environment
    fn apply(self, mut config: Config) -> anyhow::Result<Config> {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.webhook_timeout_secs {
            config.server.webhook_timeout = ServerConfig::webhook_timeout_from_secs(secs)?;
        }

        let overrides = [
            (RouteName::Connect, self.connect_route),
            (RouteName::Default, self.default_route),
            (RouteName::Disconnect, self.disconnect_route),
        ];
        if overrides.iter().any(|(_, url)| url.is_some()) {
            let mut builder = config.routes.into_builder();
            for (route, url) in overrides {
                if let Some(url) = url {
                    builder = builder.route(route, url);
                }
            }
            config.routes = builder.build()?;
        }

        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.debug {
            config.logging.level = LogLevel::Debug;
        }
        if self.json_logs {
            config.logging.json = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.apply(Config::from_env()?)?;

    init_logging(&config.logging)?;
    tracing::info!(
        port = config.server.port,
        webhook_timeout = ?config.server.webhook_timeout,
        "hookgate starting"
    );

    run_server(config).await
}
