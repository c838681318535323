//! In-process connection backed by a bounded channel.
//!
//! Follows the same overflow policy as the outbound adapter: a full queue
//! drops the connection instead of blocking the caller.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::{ChatEvent, Connection, ConnectionError, ConnectionId};

pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::Sender<ChatEvent>,
    closed: AtomicBool,
}

impl ChannelConnection {
    /// Create a connection and the receiving end of its queue
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connection = Arc::new(Self {
            id: ConnectionId::next(),
            tx,
            closed: AtomicBool::new(false),
        });
        (connection, rx)
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, event: ChatEvent) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.closed.store(true, Ordering::Release);
                Err(ConnectionError::SlowConsumer)
            }
            Err(TrySendError::Closed(_)) => {
                self.closed.store(true, Ordering::Release);
                Err(ConnectionError::Closed)
            }
        }
    }

    fn close(&self) -> Result<(), ConnectionError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoomId, Timestamp, UserId};

    fn event() -> ChatEvent {
        ChatEvent::user_joined(RoomId::generate(), UserId::generate(), Timestamp::new(0))
    }

    #[tokio::test]
    async fn test_send_enqueues_event() {
        // テスト項目: 送信したイベントを受信側で受け取れる
        // given (前提条件):
        let (conn, mut rx) = ChannelConnection::new(4);
        let event = event();

        // when (操作):
        let result = conn.send(event.clone());

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_send() {
        // テスト項目: close は 2 回呼んでも成功し、閉じた後の送信は Closed になる
        // given (前提条件):
        let (conn, _rx) = ChannelConnection::new(4);

        // when (操作):
        let first = conn.close();
        let second = conn.close();
        let send = conn.send(event());

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(send, Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_full_queue_drops_connection() {
        // テスト項目: キューが満杯になると接続が閉じられ SlowConsumer が返る
        // given (前提条件):
        let (conn, _rx) = ChannelConnection::new(1);
        conn.send(event()).unwrap();

        // when (操作):
        let overflow = conn.send(event());

        // then (期待する結果):
        assert_eq!(overflow, Err(ConnectionError::SlowConsumer));
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_dropped_receiver_marks_closed() {
        // テスト項目: 受信側が破棄されていると送信は Closed になり、接続は閉じた状態になる
        // given (前提条件):
        let (conn, rx) = ChannelConnection::new(4);
        drop(rx);

        // when (操作):
        let result = conn.send(event());

        // then (期待する結果):
        assert_eq!(result, Err(ConnectionError::Closed));
        assert!(conn.is_closed());
    }
}
