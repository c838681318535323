//! UseCase error types.

use thiserror::Error;

use crate::domain::{RepositoryError, RoomId, ValueObjectError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("auth service failure: {0}")]
    Unavailable(RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("room '{0}' not found")]
    RoomNotFound(RoomId),

    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectError {
    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    #[error("user is not a participant of this room")]
    NotAParticipant,

    #[error(transparent)]
    InvalidContent(ValueObjectError),

    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetMessagesError {
    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),
}
