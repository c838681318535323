//! UI layer: axum router, websocket and HTTP handlers, shutdown.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, ServerConfig, router};
pub use state::AppState;
