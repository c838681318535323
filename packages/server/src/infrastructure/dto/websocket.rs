//! WebSocket frame DTOs (JSON, one object per frame).

use serde::{Deserialize, Serialize};

/// Client → Server frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientFrameType {
    Message,
    #[serde(other)]
    Unknown,
}

/// Client → Server frame
///
/// `{"type": "message", "room_id": "<uuid>", "content": "<text>", "token": "<bearer>"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub r#type: ClientFrameType,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Server → Client event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserJoined,
    UserLeft,
    NewMessage,
    Error,
}

/// Persisted message as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub content: String,
    /// RFC 3339
    pub created_at: String,
}

/// Server → Client event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEventDto {
    pub r#type: EventType,
    pub room_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339
    pub timestamp: String,
}
