//! InMemory Room Directory 実装
//!
//! 既知の Room ID の集合だけを持ちます。Room メタデータは扱いません。

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{RepositoryError, RoomDirectory, RoomId};

#[derive(Default)]
pub struct InMemoryRoomDirectory {
    rooms: RwLock<HashSet<RoomId>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rooms(rooms: impl IntoIterator<Item = RoomId>) -> Self {
        Self {
            rooms: RwLock::new(rooms.into_iter().collect()),
        }
    }

    /// Room を登録（既に存在する場合は false）
    pub async fn register(&self, room_id: RoomId) -> bool {
        self.rooms.write().await.insert(room_id)
    }

    pub async fn unregister(&self, room_id: &RoomId) -> bool {
        self.rooms.write().await.remove(room_id)
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn room_exists(&self, room_id: RoomId) -> Result<bool, RepositoryError> {
        Ok(self.rooms.read().await.contains(&room_id))
    }
}
