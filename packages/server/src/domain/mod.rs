//! Domain layer for the room chat server.
//!
//! This module contains business logic that is independent of
//! transports, data transfer objects (DTOs) and storage concerns.

pub mod connection;
pub mod entity;
pub mod error;
pub mod registry;
pub mod repository;
pub mod room;
pub mod value_object;

pub use connection::{Connection, SharedConnection};
pub use entity::{ChatEvent, ChatEventType, Message, Participant};
pub use error::{ConnectionError, RepositoryError, ValueObjectError};
pub use registry::{ActiveRoom, Joined, RoomRegistry};
pub use repository::{AuthenticatedUser, MessageStore, RoomDirectory, TokenValidator};
pub use room::{BroadcastReport, Room};
pub use value_object::{
    ConnectionId, MessageContent, MessageId, Pagination, RoomId, Timestamp, UserId,
};

#[cfg(test)]
pub use repository::{MockMessageStore, MockRoomDirectory, MockTokenValidator};
