//! Hiroba chat server library.
//!
//! Multi-room websocket chat: per-room fan-out with per-connection outbound
//! queues, keep-alive, and room lifecycle tied to connected users.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
