//! InMemory Message Store 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Message, MessageStore, Pagination, Participant, RepositoryError, RoomId, UserId,
};

#[derive(Default)]
struct StoreState {
    /// Room ごとのメッセージ（古い順に追記）
    messages: HashMap<RoomId, Vec<Message>>,
    participants: HashMap<(RoomId, UserId), Participant>,
}

/// インメモリ Message Store 実装
#[derive(Default)]
pub struct InMemoryMessageStore {
    state: Mutex<StoreState>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room のメッセージ件数
    pub async fn count_messages(&self, room_id: &RoomId) -> usize {
        let state = self.state.lock().await;
        state.messages.get(room_id).map_or(0, Vec::len)
    }

    /// Room の参加者行（joined_at 順）
    pub async fn participants(&self, room_id: &RoomId) -> Vec<Participant> {
        let state = self.state.lock().await;
        let mut participants: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| &p.room_id == room_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| (p.joined_at, p.user_id));
        participants
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create_message(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .messages
            .entry(message.room_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn get_room_messages(
        &self,
        room_id: RoomId,
        pagination: Pagination,
    ) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.lock().await;
        let Some(messages) = state.messages.get(&room_id) else {
            return Ok(Vec::new());
        };
        // 新しい順
        Ok(messages
            .iter()
            .rev()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .cloned()
            .collect())
    }

    async fn add_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .participants
            .insert((participant.room_id, participant.user_id), participant);
        Ok(())
    }

    async fn remove_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.participants.remove(&(room_id, user_id));
        Ok(())
    }

    async fn is_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.participants.contains_key(&(room_id, user_id)))
    }
}
