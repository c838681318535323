//! UseCase: アクティブな Room の一覧
//!
//! Room Registry のスナップショットを返すだけの読み取り専用ユースケースです。

use std::sync::Arc;

use crate::domain::{ActiveRoom, RoomId, RoomRegistry, UserId};

pub struct ListActiveRoomsUseCase {
    registry: Arc<RoomRegistry>,
}

impl ListActiveRoomsUseCase {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// メモリ上にある Room の一覧（room_id 順）
    pub async fn execute(&self) -> Vec<ActiveRoom> {
        self.registry.snapshot().await
    }

    /// Room に接続中のユーザー。Room がメモリ上に無ければ `None`
    pub async fn participants(&self, room_id: &RoomId) -> Option<Vec<UserId>> {
        let room = self.registry.get(room_id).await?;
        Some(room.participant_ids().await)
    }
}
