//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        get_active_rooms, get_room_messages, get_room_participants, health_check,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Bind address of the HTTP / websocket listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws/rooms/{room_id}", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/rooms/active", get(get_active_rooms))
        .route(
            "/api/rooms/{room_id}/participants",
            get(get_room_participants),
        )
        .route("/api/rooms/{room_id}/messages", get(get_room_messages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state, ServerConfig::default());
/// server.run().await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    config: ServerConfig,
}

impl Server {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    /// Run until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails while running.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = router(self.state);

        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws/rooms/<room_id>?token=<token>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
