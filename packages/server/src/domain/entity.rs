//! Domain entities.

use serde::Serialize;

use super::{MessageContent, MessageId, RoomId, Timestamp, UserId};

/// A chat message, immutable once persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl Message {
    /// Build a new message with a server-assigned id
    pub fn new(
        room_id: RoomId,
        user_id: UserId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            room_id,
            user_id,
            content,
            created_at,
        }
    }
}

/// A user recorded as currently joined to a room
///
/// The store's participant row is authoritative for send authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: Timestamp,
}

impl Participant {
    pub fn new(room_id: RoomId, user_id: UserId, joined_at: Timestamp) -> Self {
        Self {
            room_id,
            user_id,
            joined_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventType {
    UserJoined,
    UserLeft,
    NewMessage,
    Error,
}

/// Event fanned out to the connections of a room
///
/// Transient: built per broadcast and dropped after the delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub event_type: ChatEventType,
    pub message: Option<Message>,
    /// Human-readable reason, only set on `error` events
    pub error: Option<String>,
    pub timestamp: Timestamp,
}

impl ChatEvent {
    pub fn user_joined(room_id: RoomId, user_id: UserId, timestamp: Timestamp) -> Self {
        Self::presence(room_id, user_id, ChatEventType::UserJoined, timestamp)
    }

    pub fn user_left(room_id: RoomId, user_id: UserId, timestamp: Timestamp) -> Self {
        Self::presence(room_id, user_id, ChatEventType::UserLeft, timestamp)
    }

    pub fn new_message(message: Message, timestamp: Timestamp) -> Self {
        Self {
            room_id: message.room_id,
            user_id: message.user_id,
            event_type: ChatEventType::NewMessage,
            message: Some(message),
            error: None,
            timestamp,
        }
    }

    pub fn error(
        room_id: RoomId,
        user_id: UserId,
        reason: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            room_id,
            user_id,
            event_type: ChatEventType::Error,
            message: None,
            error: Some(reason.into()),
            timestamp,
        }
    }

    fn presence(
        room_id: RoomId,
        user_id: UserId,
        event_type: ChatEventType,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            room_id,
            user_id,
            event_type,
            message: None,
            error: None,
            timestamp,
        }
    }
}
