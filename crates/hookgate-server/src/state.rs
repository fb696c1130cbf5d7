use std::sync::Arc;

use hookgate_config::Config;
use hookgate_gateway::{
    ConnectionRegistry, EventDispatcher, EventRouter, Gateway, GatewayError,
};

/// Shared by every HTTP handler and WebSocket connection
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live connections, shared with the gateway and the push endpoint
    pub registry: ConnectionRegistry,
    pub gateway: Gateway,
}

impl AppState {
    /// Wire a registry, a webhook router and the gateway together from `config`
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let registry = ConnectionRegistry::new();
        let router = EventRouter::new(
            config.routes.clone(),
            registry.clone(),
            config.server.webhook_timeout,
        )?;
        Ok(Self::with_dispatcher(registry, Arc::new(router)))
    }

    /// Use a custom event dispatcher instead of HTTP webhooks
    pub fn with_dispatcher(registry: ConnectionRegistry, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        let gateway = Gateway::new(registry.clone(), dispatcher);
        Self { registry, gateway }
    }
}
