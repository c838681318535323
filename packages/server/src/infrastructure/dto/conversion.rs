//! Conversion logic between domain entities and DTOs.

use hiroba_shared::time::timestamp_to_rfc3339;

use crate::domain::{ActiveRoom, ChatEvent, ChatEventType, Message};
use crate::infrastructure::dto::{http as http_dto, websocket as ws_dto};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<Message> for ws_dto::MessageDto {
    fn from(model: Message) -> Self {
        Self {
            id: model.id.to_string(),
            room_id: model.room_id.to_string(),
            user_id: model.user_id.to_string(),
            content: model.content.into_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<ChatEventType> for ws_dto::EventType {
    fn from(model: ChatEventType) -> Self {
        match model {
            ChatEventType::UserJoined => Self::UserJoined,
            ChatEventType::UserLeft => Self::UserLeft,
            ChatEventType::NewMessage => Self::NewMessage,
            ChatEventType::Error => Self::Error,
        }
    }
}

impl From<ChatEvent> for ws_dto::ChatEventDto {
    fn from(model: ChatEvent) -> Self {
        Self {
            r#type: model.event_type.into(),
            room_id: model.room_id.to_string(),
            user_id: model.user_id.to_string(),
            message: model.message.map(Into::into),
            error: model.error,
            timestamp: timestamp_to_rfc3339(model.timestamp.value()),
        }
    }
}

impl From<ActiveRoom> for http_dto::ActiveRoomDto {
    fn from(model: ActiveRoom) -> Self {
        Self {
            room_id: model.room_id.to_string(),
            participants: model
                .participant_ids
                .iter()
                .map(ToString::to_string)
                .collect(),
            last_activity: timestamp_to_rfc3339(model.last_activity.value()),
        }
    }
}
