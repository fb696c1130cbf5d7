//! HTTP server - WebSocket upgrades, push endpoint and health check

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use hookgate_config::{Config, RouteName};
use tower_http::trace::TraceLayer;

use crate::handlers::{connections, health, websocket};
use crate::state::AppState;

/// Run the gateway until Ctrl-C
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(&config)?);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Starting server on {}", addr);

    if config.routes.is_empty() {
        tracing::warn!("No webhook routes configured; events will only be logged");
    } else {
        tracing::info!("Routing events: {:?}", config.routes.configured());
    }
    for route in RouteName::ALL {
        match config.routes.resolve(route) {
            Some(url) => tracing::info!(route = %route, "Route {} -> {}", route, url),
            None => tracing::info!(
                route = %route,
                "No route defined for {} ({} not set)",
                route,
                route.env_key()
            ),
        }
    }

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ws", get(websocket::websocket_handler))
        .route(
            "/connections/:connection_id",
            post(connections::push_handler).get(connections::get_connection_handler),
        )
        // Path used by earlier releases
        .route(
            "/@connections/:connection_id",
            post(connections::push_handler).get(connections::get_connection_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
