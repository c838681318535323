//! Room: in-memory registry of the connections joined to one room.
//!
//! 接続マップとロックは Room ごとに独立しており、競合は 1 つの Room の中に閉じます。
//! ブロードキャストはロックを保持したまま送信しません（スナップショットを取ってから送信）。

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::{ChatEvent, ConnectionId, RoomId, SharedConnection, Timestamp, UserId};

/// Result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of connections the event was enqueued on
    pub delivered: usize,
    /// Users whose connection failed and was removed from the room
    pub pruned: Vec<UserId>,
}

struct RoomState {
    connections: HashMap<UserId, SharedConnection>,
    last_activity: Timestamp,
}

/// Runtime state of one chat room
///
/// Holds at most one connection per user. Lives only while the
/// [`RoomRegistry`](super::RoomRegistry) keeps it.
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(id: RoomId, created_at: Timestamp) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState {
                connections: HashMap::new(),
                last_activity: created_at,
            }),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Register a connection for `user_id`.
    ///
    /// A connection already registered for the same user is closed first
    /// (stale-session eviction). Returns the id of the evicted connection.
    pub async fn add_connection(
        &self,
        user_id: UserId,
        connection: SharedConnection,
        now: Timestamp,
    ) -> Option<ConnectionId> {
        let mut state = self.state.lock().await;
        let evicted = state.connections.remove(&user_id).map(|stale| {
            let _ = stale.close();
            stale.id()
        });
        if let Some(stale_id) = evicted {
            tracing::info!(
                "Evicted stale connection {} of user '{}' in room '{}'",
                stale_id,
                user_id,
                self.id
            );
        }
        state.connections.insert(user_id, connection);
        state.last_activity = now;
        evicted
    }

    /// Remove and close the connection of `user_id`. No-op if absent.
    pub async fn remove_connection(&self, user_id: &UserId, now: Timestamp) -> bool {
        let mut state = self.state.lock().await;
        state.last_activity = now;
        match state.connections.remove(user_id) {
            Some(connection) => {
                let _ = connection.close();
                true
            }
            None => false,
        }
    }

    /// Remove the connection of `user_id` only if it is `connection_id`.
    ///
    /// Used by session teardown: a session replaced by a newer one must not
    /// remove its replacement.
    pub async fn remove_connection_if(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
        now: Timestamp,
    ) -> bool {
        let mut state = self.state.lock().await;
        let matches = state
            .connections
            .get(user_id)
            .is_some_and(|c| c.id() == connection_id);
        if !matches {
            return false;
        }
        state.last_activity = now;
        if let Some(connection) = state.connections.remove(user_id) {
            let _ = connection.close();
        }
        true
    }

    /// Deliver `event` to every connection except `exclude`.
    ///
    /// Works on a snapshot of the connection map, so no lock is held while
    /// sending. `send` never blocks; a connection whose send fails is removed
    /// from the room afterwards and closed. The broadcast itself never fails.
    pub async fn broadcast(&self, event: &ChatEvent, exclude: Option<&UserId>) -> BroadcastReport {
        let targets: Vec<(UserId, SharedConnection)> = {
            let state = self.state.lock().await;
            state
                .connections
                .iter()
                .filter(|(user_id, _)| Some(*user_id) != exclude)
                .map(|(user_id, connection)| (*user_id, connection.clone()))
                .collect()
        };

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (user_id, connection) in targets {
            match connection.send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to deliver {:?} to user '{}' in room '{}': {}",
                        event.event_type,
                        user_id,
                        self.id,
                        e
                    );
                    failed.push((user_id, connection.id()));
                }
            }
        }

        if !failed.is_empty() {
            let mut state = self.state.lock().await;
            for (user_id, connection_id) in failed {
                // The user may have reconnected since the snapshot was taken.
                let still_registered = state
                    .connections
                    .get(&user_id)
                    .is_some_and(|c| c.id() == connection_id);
                if still_registered {
                    if let Some(connection) = state.connections.remove(&user_id) {
                        let _ = connection.close();
                    }
                    report.pruned.push(user_id);
                }
            }
        }

        report
    }

    /// True iff no open connection remains
    pub async fn is_empty(&self) -> bool {
        let state = self.state.lock().await;
        state.connections.values().all(|c| c.is_closed())
    }

    /// Number of open connections
    pub async fn connection_count(&self) -> usize {
        let state = self.state.lock().await;
        state.connections.values().filter(|c| !c.is_closed()).count()
    }

    /// Snapshot of the users with an open connection, sorted for stable output
    pub async fn participant_ids(&self) -> Vec<UserId> {
        let state = self.state.lock().await;
        let mut ids: Vec<UserId> = state
            .connections
            .iter()
            .filter(|(_, c)| !c.is_closed())
            .map(|(user_id, _)| *user_id)
            .collect();
        ids.sort();
        ids
    }

    /// True if `user_id` has an open connection in this room
    pub async fn is_connected(&self, user_id: &UserId) -> bool {
        let state = self.state.lock().await;
        state
            .connections
            .get(user_id)
            .is_some_and(|c| !c.is_closed())
    }

    pub async fn connection_id_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        let state = self.state.lock().await;
        state.connections.get(user_id).map(|c| c.id())
    }

    pub async fn last_activity(&self) -> Timestamp {
        self.state.lock().await.last_activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::Connection, infrastructure::connection::ChannelConnection};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - Room の接続登録・削除・ブロードキャスト
    // - 同一ユーザーの再接続時に古い接続が閉じられること
    // - 閉じた接続がブロードキャスト時に取り除かれること
    //
    // 【なぜこのテストが必要か】
    // - 1 つの壊れた接続が Room 全体の配信を止めてはならない
    // - 1 ユーザーにつき接続は最大 1 つという不変条件を保証する
    // ========================================

    fn ts(value: i64) -> Timestamp {
        Timestamp::new(value)
    }

    fn test_room() -> Room {
        Room::new(RoomId::generate(), ts(0))
    }

    #[tokio::test]
    async fn test_add_connection_registers_user() {
        // テスト項目: 接続を登録すると参加者 ID と最終アクティビティが更新される
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let (conn, _rx) = ChannelConnection::new(8);

        // when (操作):
        let evicted = room.add_connection(alice, conn, ts(10)).await;

        // then (期待する結果):
        assert_eq!(evicted, None);
        assert_eq!(room.participant_ids().await, vec![alice]);
        assert_eq!(room.connection_count().await, 1);
        assert_eq!(room.last_activity().await, ts(10));
        assert!(!room.is_empty().await);
    }

    #[tokio::test]
    async fn test_reconnect_evicts_stale_connection() {
        // テスト項目: 同じユーザーが再接続すると古い接続が閉じられ、新しい接続だけが残る
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let (c1, _rx1) = ChannelConnection::new(8);
        let (c2, _rx2) = ChannelConnection::new(8);
        room.add_connection(alice, c1.clone(), ts(1)).await;

        // when (操作):
        let evicted = room.add_connection(alice, c2.clone(), ts(2)).await;

        // then (期待する結果):
        assert_eq!(evicted, Some(c1.id()));
        assert!(c1.is_closed());
        assert!(!c2.is_closed());
        assert_eq!(room.connection_count().await, 1);
        assert_eq!(room.connection_id_of(&alice).await, Some(c2.id()));
    }

    #[tokio::test]
    async fn test_remove_connection_closes_and_is_idempotent() {
        // テスト項目: 削除すると接続が閉じられ、2 回目の削除は何もしない
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let (conn, _rx) = ChannelConnection::new(8);
        room.add_connection(alice, conn.clone(), ts(1)).await;

        // when (操作):
        let first = room.remove_connection(&alice, ts(2)).await;
        let second = room.remove_connection(&alice, ts(3)).await;

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(conn.is_closed());
        assert!(room.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_connection_if_ignores_other_session() {
        // テスト項目: 接続 ID が一致しない場合は削除しない（再接続後の古いセッション終了）
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let (c1, _rx1) = ChannelConnection::new(8);
        let (c2, _rx2) = ChannelConnection::new(8);
        room.add_connection(alice, c1.clone(), ts(1)).await;
        room.add_connection(alice, c2.clone(), ts(2)).await;

        // when (操作):
        let removed_stale = room.remove_connection_if(&alice, c1.id(), ts(3)).await;
        let removed_current = room.remove_connection_if(&alice, c2.id(), ts(4)).await;

        // then (期待する結果):
        assert!(!removed_stale);
        assert!(removed_current);
        assert!(c2.is_closed());
        assert!(room.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        // テスト項目: exclude 指定なしのブロードキャストは全員に届く
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let bob = UserId::generate();
        let (ca, mut rx_a) = ChannelConnection::new(8);
        let (cb, mut rx_b) = ChannelConnection::new(8);
        room.add_connection(alice, ca, ts(1)).await;
        room.add_connection(bob, cb, ts(1)).await;
        let event = ChatEvent::user_joined(room.id(), bob, ts(2));

        // when (操作):
        let report = room.broadcast(&event, None).await;

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        assert!(report.pruned.is_empty());
        assert_eq!(rx_a.recv().await, Some(event.clone()));
        assert_eq!(rx_b.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_broadcast_respects_exclude() {
        // テスト項目: exclude に指定したユーザーには届かない
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let bob = UserId::generate();
        let (ca, mut rx_a) = ChannelConnection::new(8);
        let (cb, mut rx_b) = ChannelConnection::new(8);
        room.add_connection(alice, ca, ts(1)).await;
        room.add_connection(bob, cb, ts(1)).await;
        let event = ChatEvent::user_left(room.id(), alice, ts(2));

        // when (操作):
        let report = room.broadcast(&event, Some(&alice)).await;

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        assert_eq!(rx_b.recv().await, Some(event));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_prunes_closed_connection() {
        // テスト項目: N 個中 1 個が閉じていても残り N-1 個に届き、閉じた接続は取り除かれる
        // given (前提条件):
        let room = test_room();
        let users: Vec<UserId> = (0..3).map(|_| UserId::generate()).collect();
        let mut receivers = Vec::new();
        let mut connections = Vec::new();
        for user in &users {
            let (conn, rx) = ChannelConnection::new(8);
            room.add_connection(*user, conn.clone(), ts(1)).await;
            receivers.push(rx);
            connections.push(conn);
        }
        connections[1].close().unwrap();
        let event = ChatEvent::user_joined(room.id(), users[0], ts(2));

        // when (操作):
        let report = room.broadcast(&event, None).await;

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned, vec![users[1]]);
        assert_eq!(receivers[0].recv().await, Some(event.clone()));
        assert_eq!(receivers[2].recv().await, Some(event));
        assert_eq!(room.connection_count().await, 2);
        assert!(!room.participant_ids().await.contains(&users[1]));
    }

    #[tokio::test]
    async fn test_broadcast_drops_slow_consumer() {
        // テスト項目: キューが満杯の接続は切断され、他の接続への配信は続く
        // given (前提条件):
        let room = test_room();
        let slow = UserId::generate();
        let healthy = UserId::generate();
        let (slow_conn, _slow_rx) = ChannelConnection::new(1);
        let (healthy_conn, mut healthy_rx) = ChannelConnection::new(8);
        room.add_connection(slow, slow_conn.clone(), ts(1)).await;
        room.add_connection(healthy, healthy_conn, ts(1)).await;
        let first = ChatEvent::user_joined(room.id(), slow, ts(2));
        let second = ChatEvent::user_joined(room.id(), healthy, ts(3));

        // when (操作):
        room.broadcast(&first, None).await;
        let report = room.broadcast(&second, None).await;

        // then (期待する結果):
        assert_eq!(report.pruned, vec![slow]);
        assert!(slow_conn.is_closed());
        assert_eq!(healthy_rx.recv().await, Some(first));
        assert_eq!(healthy_rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn test_is_empty_ignores_closed_connections() {
        // テスト項目: 閉じた接続しか残っていない Room は空とみなされ、参加者一覧にも現れない
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let (conn, _rx) = ChannelConnection::new(8);
        room.add_connection(alice, conn.clone(), ts(1)).await;

        // when (操作):
        conn.close().unwrap();

        // then (期待する結果):
        assert!(room.is_empty().await);
        assert_eq!(room.connection_count().await, 0);
        assert!(room.participant_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_participant_ids_skip_closed_connections() {
        // テスト項目: 参加者一覧は開いている接続のユーザーだけを返し、connection_count と一致する
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let bob = UserId::generate();
        let (ca, _rx_a) = ChannelConnection::new(8);
        let (cb, _rx_b) = ChannelConnection::new(8);
        room.add_connection(alice, ca, ts(1)).await;
        room.add_connection(bob, cb.clone(), ts(2)).await;

        // when (操作):
        cb.close().unwrap();

        // then (期待する結果):
        assert_eq!(room.participant_ids().await, vec![alice]);
        assert_eq!(room.connection_count().await, 1);
        assert!(room.is_connected(&alice).await);
        assert!(!room.is_connected(&bob).await);
    }

    #[tokio::test]
    async fn test_consecutive_broadcasts_keep_per_connection_order() {
        // テスト項目: 同じ Room への連続したブロードキャストは各接続で呼び出し順に届く
        // given (前提条件):
        let room = test_room();
        let alice = UserId::generate();
        let (conn, mut rx) = ChannelConnection::new(64);
        room.add_connection(alice, conn, ts(1)).await;

        // when (操作):
        for i in 0..20 {
            let event = ChatEvent::user_joined(room.id(), alice, ts(i));
            room.broadcast(&event, None).await;
        }

        // then (期待する結果):
        for i in 0..20 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.timestamp, ts(i));
        }
    }
}
