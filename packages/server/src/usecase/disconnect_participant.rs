//! UseCase: 参加者切断処理
//!
//! 切断は冪等です。Room が既に無い場合や、ユーザーが既に接続していない場合は
//! ブロードキャストを行わずに成功します。最後の接続が外れた Room は Registry から
//! 取り除かれます（Room のリークを防ぐ）。

use std::{sync::Arc, time::Duration};

use hiroba_shared::time::Clock;

use crate::domain::{ConnectionId, MessageStore, Room, RoomId, RoomRegistry, Timestamp, UserId};

use super::{departure::Departure, error::DisconnectError};

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    registry: Arc<RoomRegistry>,
    message_store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl DisconnectParticipantUseCase {
    pub fn new(
        registry: Arc<RoomRegistry>,
        message_store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            message_store,
            clock,
            store_timeout,
        }
    }

    fn departure(&self) -> Departure<'_> {
        Departure {
            registry: &self.registry,
            message_store: &self.message_store,
            clock: &self.clock,
            store_timeout: self.store_timeout,
        }
    }

    /// ユーザーを Room から切断する
    ///
    /// 接続を取り除いて閉じ、参加者行を削除し、`user_left` をブロードキャストします。
    pub async fn execute(&self, room_id: RoomId, user_id: UserId) -> Result<(), DisconnectError> {
        let now = Timestamp::new(self.clock.now_millis());
        let Some(room) = self.registry.get(&room_id).await else {
            // Room は既に無い（最後の接続がブロードキャスト時に取り除かれた場合を含む）
            self.forget_participant(room_id, user_id).await;
            return Ok(());
        };

        if !room.remove_connection(&user_id, now).await {
            self.forget_participant(room_id, user_id).await;
            self.registry.release_if_empty(&room_id).await;
            return Ok(());
        }

        self.finish_leave(&room, user_id).await
    }

    /// 特定のセッション（接続）を終了する
    ///
    /// トランスポート層がソケット終了時に呼びます。登録されている接続が `connection_id`
    /// でない場合（再接続で置き換えられた古いセッション）は何もしません。
    pub async fn execute_session(
        &self,
        room_id: RoomId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<(), DisconnectError> {
        let now = Timestamp::new(self.clock.now_millis());
        let Some(room) = self.registry.get(&room_id).await else {
            self.forget_participant(room_id, user_id).await;
            return Ok(());
        };

        if !room.remove_connection_if(&user_id, connection_id, now).await {
            if room.connection_id_of(&user_id).await.is_none() {
                // ブロードキャスト時に取り除かれ、user_left は送信済み
                self.forget_participant(room_id, user_id).await;
            }
            self.registry.release_if_empty(&room_id).await;
            tracing::debug!(
                "Session {} of user '{}' already superseded or removed",
                connection_id,
                user_id
            );
            return Ok(());
        }

        self.finish_leave(&room, user_id).await
    }

    /// 接続を外した後の処理。永続化の成否に関わらず通知と片付けは行う
    async fn finish_leave(&self, room: &Room, user_id: UserId) -> Result<(), DisconnectError> {
        self.departure()
            .settle(room, vec![user_id])
            .await
            .map_err(DisconnectError::Persistence)
    }

    /// 参加者行を削除（失敗してもログのみ）
    async fn forget_participant(&self, room_id: RoomId, user_id: UserId) {
        if let Err(e) = self.departure().forget(room_id, user_id).await {
            tracing::warn!(
                "Failed to delete stale participant '{}' of room '{}': {}",
                user_id,
                room_id,
                e
            );
        }
    }
}
