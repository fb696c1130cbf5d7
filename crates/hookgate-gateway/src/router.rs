//! Event routing
//!
//! Delivers lifecycle and message events to the configured webhooks and
//! relays any reply back to the originating connection. Every failure is
//! logged and swallowed: a broken backend must never end a connection.

use async_trait::async_trait;
use hookgate_config::{RouteConfig, RouteName};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::gateway::GatewayError;
use crate::push::{self, PushError};
use crate::registry::ConnectionRegistry;

/// Header carrying the connection identity on webhook calls
pub const CONNECTION_ID_HEADER: &str = "connectionId";

/// What happened to a single routed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No webhook configured for the route
    Unrouted,
    /// The webhook replied with a `body` that reached the client
    Delivered,
    /// The webhook succeeded without a client-visible reply
    NoReply,
    /// The webhook replied but the connection could not be written to
    ReplyUndeliverable,
    /// The webhook answered with a status >= 400
    Rejected(u16),
    /// The call exceeded its deadline
    TimedOut,
    /// Connection refused, DNS failure, reset, ...
    TransportFailed,
    /// The reply was not valid JSON
    MalformedReply,
}

/// Where the gateway sends lifecycle events
///
/// Implementations must not fail back into the caller; the connection loop
/// awaits each dispatch before reading the next frame.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, route: RouteName, connection_id: &str, payload: String);
}

/// Calls webhooks over HTTP
#[derive(Debug, Clone)]
pub struct EventRouter {
    routes: RouteConfig,
    registry: ConnectionRegistry,
    client: Client,
}

impl EventRouter {
    /// Create a router whose webhook calls each carry a total deadline of `timeout`
    pub fn new(
        routes: RouteConfig,
        registry: ConnectionRegistry,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            routes,
            registry,
            client,
        })
    }

    /// Route an event; the outcome is logged and discarded
    pub async fn invoke(&self, route: RouteName, connection_id: &str, payload: String) {
        let outcome = self.invoke_with_outcome(route, connection_id, payload).await;
        debug!(route = %route, connection_id = %connection_id, ?outcome, "Event routed");
    }

    /// Route an event and report what happened
    pub async fn invoke_with_outcome(
        &self,
        route: RouteName,
        connection_id: &str,
        payload: String,
    ) -> RouteOutcome {
        let Some(url) = self.routes.resolve(route) else {
            info!(route = %route, "No route defined for {}", route);
            return RouteOutcome::Unrouted;
        };

        let response = match self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONNECTION_ID_HEADER, connection_id)
            .body(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.transport_failure(route, connection_id, e),
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            warn!(
                route = %route,
                connection_id = %connection_id,
                status = status.as_u16(),
                "Error calling {} handler: {}",
                route,
                status
            );
            return RouteOutcome::Rejected(status.as_u16());
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return self.transport_failure(route, connection_id, e),
        };
        if text.trim().is_empty() {
            return RouteOutcome::NoReply;
        }

        let reply: Value = match serde_json::from_str(&text) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    route = %route,
                    connection_id = %connection_id,
                    "Invalid JSON response from {} handler: {}",
                    route,
                    e
                );
                return RouteOutcome::MalformedReply;
            }
        };

        let Some(body) = reply.as_object().and_then(|object| object.get("body")) else {
            return RouteOutcome::NoReply;
        };

        match push::deliver(&self.registry, connection_id, body).await {
            Ok(()) => RouteOutcome::Delivered,
            Err(PushError::Gone(_)) => {
                debug!(
                    route = %route,
                    connection_id = %connection_id,
                    "Dropping reply for closed connection"
                );
                RouteOutcome::ReplyUndeliverable
            }
            Err(e) => {
                warn!(route = %route, connection_id = %connection_id, "Reply not delivered: {}", e);
                RouteOutcome::ReplyUndeliverable
            }
        }
    }

    fn transport_failure(
        &self,
        route: RouteName,
        connection_id: &str,
        error: reqwest::Error,
    ) -> RouteOutcome {
        if error.is_timeout() {
            warn!(route = %route, connection_id = %connection_id, "Timeout calling {} handler", route);
            RouteOutcome::TimedOut
        } else {
            warn!(
                route = %route,
                connection_id = %connection_id,
                "Error calling {} handler: {}",
                route,
                error
            );
            RouteOutcome::TransportFailed
        }
    }
}

#[async_trait]
impl EventDispatcher for EventRouter {
    async fn dispatch(&self, route: RouteName, connection_id: &str, payload: String) {
        self.invoke(route, connection_id, payload).await;
    }
}
