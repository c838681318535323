//! 参加者の退出処理
//!
//! 参加者行の削除、`user_left` のブロードキャスト、空になった Room の解放をまとめます。
//! 明示的な切断だけでなく、ブロードキャスト中に送信に失敗して取り除かれた接続も
//! ここを通るため、どちらの場合も残りの参加者には `user_left` が 1 回だけ届きます。
//!
//! 参加者行の削除中に同じユーザーが再接続した場合は、削除の後で行を戻します
//! （再接続側の `add_participant` が先に完了していても、参加者として残る）。

use std::{collections::VecDeque, sync::Arc, time::Duration};

use hiroba_shared::time::Clock;

use crate::domain::{
    ChatEvent, MessageStore, Participant, RepositoryError, Room, RoomId, RoomRegistry, Timestamp,
    UserId,
};

use super::deadline::with_deadline;

/// Outcome of [`Departure::forget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Forget {
    /// The participant row is gone
    Removed,
    /// The user connected again while the row was deleted; the row was restored
    Reconnected,
}

/// Collaborators needed to take a user out of a room
pub(crate) struct Departure<'a> {
    pub registry: &'a RoomRegistry,
    pub message_store: &'a Arc<dyn MessageStore>,
    pub clock: &'a Arc<dyn Clock>,
    pub store_timeout: Duration,
}

impl Departure<'_> {
    /// Delete the participant row of `user_id` unless the user is connected again.
    ///
    /// The registry is checked after the delete, so a reconnect that stored its
    /// row while the delete was in flight gets the row back.
    pub async fn forget(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Forget, RepositoryError> {
        let removed = with_deadline(
            self.store_timeout,
            self.message_store.remove_participant(room_id, user_id),
        )
        .await;

        let connected = match self.registry.get(&room_id).await {
            Some(room) => room.is_connected(&user_id).await,
            None => false,
        };
        if !connected {
            return removed.map(|()| Forget::Removed);
        }

        let participant =
            Participant::new(room_id, user_id, Timestamp::new(self.clock.now_millis()));
        with_deadline(
            self.store_timeout,
            self.message_store.add_participant(participant),
        )
        .await?;
        tracing::debug!(
            "User '{}' reconnected to room '{}' while leaving, participant kept",
            user_id,
            room_id
        );
        Ok(Forget::Reconnected)
    }

    /// Take `users` out of `room`: forget each one and broadcast `user_left`.
    ///
    /// Connections pruned by those broadcasts are taken out the same way.
    /// The room is released afterwards if nobody is left in it. Returns the
    /// first store error among `users`; errors for pruned peers are only logged.
    pub async fn settle(&self, room: &Room, users: Vec<UserId>) -> Result<(), RepositoryError> {
        let room_id = room.id();
        let mut pending: VecDeque<(UserId, bool)> =
            users.into_iter().map(|user_id| (user_id, true)).collect();
        let mut first_error = None;

        while let Some((user_id, requested)) = pending.pop_front() {
            let forgotten = self.forget(room_id, user_id).await;
            if forgotten == Ok(Forget::Reconnected) {
                continue;
            }

            let event =
                ChatEvent::user_left(room_id, user_id, Timestamp::new(self.clock.now_millis()));
            let report = room.broadcast(&event, None).await;
            pending.extend(report.pruned.into_iter().map(|pruned| (pruned, false)));
            tracing::info!("User '{}' left room '{}'", user_id, room_id);

            if let Err(e) = forgotten {
                tracing::warn!(
                    "Failed to delete participant '{}' of room '{}': {}",
                    user_id,
                    room_id,
                    e
                );
                if requested && first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if self.registry.release_if_empty(&room_id).await {
            tracing::debug!("Room '{}' is empty after departures", room_id);
        }
        first_error.map_or(Ok(()), Err)
    }
}
