//! UseCase: メッセージ履歴取得
//!
//! Message Store への読み取りのみで、Room Registry には触れません。

use std::{sync::Arc, time::Duration};

use crate::domain::{Message, MessageStore, Pagination, RoomId};

use super::{deadline::with_deadline, error::GetMessagesError};

/// 取得結果（正規化後のページング情報を含む）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub pagination: Pagination,
    /// 新しい順
    pub messages: Vec<Message>,
}

pub struct GetMessagesUseCase {
    message_store: Arc<dyn MessageStore>,
    store_timeout: Duration,
}

impl GetMessagesUseCase {
    pub fn new(message_store: Arc<dyn MessageStore>, store_timeout: Duration) -> Self {
        Self {
            message_store,
            store_timeout,
        }
    }

    /// `limit` は (0, 100] に丸め（既定 50）、`offset` は 0 以上に丸めてから問い合わせる
    pub async fn execute(
        &self,
        room_id: RoomId,
        limit: i64,
        offset: i64,
    ) -> Result<MessagePage, GetMessagesError> {
        let pagination = Pagination::normalize(limit, offset);
        let messages = with_deadline(
            self.store_timeout,
            self.message_store.get_room_messages(room_id, pagination),
        )
        .await
        .map_err(GetMessagesError::Persistence)?;
        Ok(MessagePage {
            pagination,
            messages,
        })
    }
}
