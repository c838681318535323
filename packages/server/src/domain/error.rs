//! Domain error types.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("invalid {kind}: '{value}'")]
    InvalidId { kind: &'static str, value: String },

    #[error("message content must not be empty")]
    EmptyContent,

    #[error("message content too long ({actual} chars, max {max})")]
    ContentTooLong { max: usize, actual: usize },
}

/// Errors returned by external collaborators (message store, room directory, auth)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage call timed out")]
    Timeout,

    #[error("invalid or expired token")]
    InvalidToken,
}

/// Errors returned by a [`Connection`](super::Connection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    /// The outbound queue was full; the connection has been dropped.
    #[error("outbound queue full, connection dropped")]
    SlowConsumer,
}
