//! Hookgate Gateway - connection lifecycle and webhook routing
//!
//! Accepts WebSocket connections, gives each one a durable identity and
//! forwards `connect`, `default` and `disconnect` events to HTTP webhooks.
//! Backends can push messages back to any open connection by identity.

mod connection;
mod gateway;
mod protocol;
mod push;
mod registry;
mod router;

pub use connection::{run_writer, ConnectionError, ConnectionHandle, Outbound};
pub use gateway::{CloseReason, ConnectionState, Gateway, GatewayError};
pub use protocol::{ConnectionInfo, PushRequest, WsFrame};
pub use push::{deliver, push, PushError};
pub use registry::{ConnectionRegistry, RegistryError};
pub use router::{EventDispatcher, EventRouter, RouteOutcome};

pub use hookgate_config::{RouteConfig, RouteName};
