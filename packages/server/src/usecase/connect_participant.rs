//! UseCase: 参加者接続処理
//!
//! ## 処理の順序
//!
//! 1. Room の存在確認（外部コラボレータ）
//! 2. Room Registry で Room を取得または作成し、接続を登録
//! 3. 参加者行を永続化（失敗したら 2 の登録を取り消す）
//! 4. `user_joined` をブロードキャスト
//!
//! 登録を永続化より先に行うことで、本人が自分の join イベントを受け取れます。
//! 永続化に失敗した場合は登録を取り消し、ストアが知らない接続を残しません。

use std::{sync::Arc, time::Duration};

use hiroba_shared::time::Clock;

use crate::domain::{
    ChatEvent, MessageStore, Participant, RoomDirectory, RoomId, RoomRegistry, SharedConnection,
    Timestamp, UserId,
};

use super::{deadline::with_deadline, departure::Departure, error::ConnectError};

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    registry: Arc<RoomRegistry>,
    room_directory: Arc<dyn RoomDirectory>,
    message_store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl ConnectParticipantUseCase {
    pub fn new(
        registry: Arc<RoomRegistry>,
        room_directory: Arc<dyn RoomDirectory>,
        message_store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            room_directory,
            message_store,
            clock,
            store_timeout,
        }
    }

    /// Room Directory に Room が存在するかを確認
    ///
    /// トランスポート層がアップグレード前に 404 を返すためにも使います。
    pub async fn ensure_room_exists(&self, room_id: RoomId) -> Result<(), ConnectError> {
        let exists = with_deadline(self.store_timeout, self.room_directory.room_exists(room_id))
            .await
            .map_err(ConnectError::Persistence)?;
        if exists {
            Ok(())
        } else {
            Err(ConnectError::RoomNotFound(room_id))
        }
    }

    /// 参加者接続を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Timestamp)` - 接続成功（参加時刻）
    /// * `Err(ConnectError::RoomNotFound)` - Room が存在しない（接続は登録されない）
    /// * `Err(ConnectError::Persistence)` - 外部コラボレータの失敗（登録は取り消される）
    pub async fn execute(
        &self,
        room_id: RoomId,
        user_id: UserId,
        connection: SharedConnection,
    ) -> Result<Timestamp, ConnectError> {
        // 1. Room の存在確認
        self.ensure_room_exists(room_id).await?;

        // 2. Room Registry に接続を登録
        let joined_at = Timestamp::new(self.clock.now_millis());
        let connection_id = connection.id();
        let joined = self
            .registry
            .join(room_id, user_id, connection, joined_at)
            .await;

        // 3. 参加者行を永続化（失敗したらロールバック）
        let participant = Participant::new(room_id, user_id, joined_at);
        if let Err(e) = with_deadline(
            self.store_timeout,
            self.message_store.add_participant(participant),
        )
        .await
        {
            tracing::warn!(
                "Failed to persist participant '{}' in room '{}', rolling back: {}",
                user_id,
                room_id,
                e
            );
            let now = Timestamp::new(self.clock.now_millis());
            joined
                .room
                .remove_connection_if(&user_id, connection_id, now)
                .await;
            self.registry.release_if_empty(&room_id).await;
            return Err(ConnectError::Persistence(e));
        }

        // 4. user_joined をブロードキャスト
        let event = ChatEvent::user_joined(room_id, user_id, joined_at);
        let report = joined.room.broadcast(&event, None).await;
        if !report.pruned.is_empty() {
            // 削除の失敗はログのみ（本人の接続は成功している）
            let departure = Departure {
                registry: &self.registry,
                message_store: &self.message_store,
                clock: &self.clock,
                store_timeout: self.store_timeout,
            };
            let _ = departure.settle(&joined.room, report.pruned.clone()).await;
        }

        tracing::info!(
            "User '{}' joined room '{}' via {} ({} recipient(s))",
            user_id,
            room_id,
            connection_id,
            report.delivered
        );
        Ok(joined_at)
    }
}
