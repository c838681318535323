//! UseCase: メッセージ送信処理
//!
//! 送信の可否は参加者行の有無で判定します（生きている接続の有無ではない）。
//! 永続化に成功したメッセージだけを `new_message` としてブロードキャストします。
//! ブロードキャストは送信者自身も含みます（重複排除はクライアント側で行う）。

use std::{sync::Arc, time::Duration};

use hiroba_shared::time::Clock;

use crate::domain::{
    ChatEvent, Message, MessageContent, MessageStore, RoomId, RoomRegistry, Timestamp, UserId,
};

use super::{deadline::with_deadline, departure::Departure, error::SendMessageError};

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    registry: Arc<RoomRegistry>,
    message_store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl SendMessageUseCase {
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

    /// メッセージ送信を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Message)` - 永続化されたメッセージ（サーバーが採番した id と時刻を含む）
    /// * `Err(SendMessageError)` - 送信失敗（この場合ブロードキャストは行われない）
    pub async fn execute(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: String,
    ) -> Result<Message, SendMessageError> {
        // 1. 参加者かどうか（ストアが唯一の根拠）
        let is_participant = with_deadline(
            self.store_timeout,
            self.message_store.is_participant(room_id, user_id),
        )
        .await
        .map_err(SendMessageError::Persistence)?;
        if !is_participant {
            return Err(SendMessageError::NotAParticipant);
        }

        // 2. 内容の検証
        let content = MessageContent::new(content).map_err(SendMessageError::InvalidContent)?;

        // 3. 永続化
        let created_at = Timestamp::new(self.clock.now_millis());
        let message = Message::new(room_id, user_id, content, created_at);
        let message = with_deadline(
            self.store_timeout,
            self.message_store.create_message(message),
        )
        .await
        .map_err(SendMessageError::Persistence)?;

        // 4. ブロードキャスト（Room がメモリ上に無ければスキップ）
        match self.registry.get(&room_id).await {
            Some(room) => {
                let event = ChatEvent::new_message(message.clone(), created_at);
                let report = room.broadcast(&event, None).await;
                if !report.pruned.is_empty() {
                    // 削除の失敗はログのみ（メッセージは保存済み）
                    let departure = Departure {
                        registry: &self.registry,
                        message_store: &self.message_store,
                        clock: &self.clock,
                        store_timeout: self.store_timeout,
                    };
                    let _ = departure.settle(&room, report.pruned.clone()).await;
                }
                tracing::debug!(
                    "Broadcasted message {} from '{}' to {} connection(s)",
                    message.id,
                    user_id,
                    report.delivered
                );
            }
            None => {
                tracing::debug!(
                    "Room '{}' has no active connections, skipping broadcast",
                    room_id
                );
            }
        }

        Ok(message)
    }
}
