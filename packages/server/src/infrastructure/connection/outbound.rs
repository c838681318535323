//! Outbound Adapter: bounded, asynchronous write path over a WebSocket sink.
//!
//! ## 責務
//!
//! - 上限付きキューと、それを取り出す専用の writer タスク
//! - keep-alive（書き込みかクライアントからの受信が ping_interval の間途絶えたら
//!   Ping を送信し、その Ping の後 pong-wait の間に何も届かなければ切断）
//! - キューが満杯なら送信側をブロックせず接続を切断する（遅いクライアントが
//!   他の参加者への配信を止めない）
//!
//! ## 設計ノート
//!
//! WebSocket の生成と読み込みは UI 層（`ui/handler/websocket.rs`）が行い、
//! 書き込み側の `Sink` だけをこのアダプタに渡します。読み込みループは受信のたびに
//! [`OutboundAdapter::record_activity`] を呼び、生存確認の時計を進めます。

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use axum::{body::Bytes, extract::ws::Message};
use futures_util::{Sink, SinkExt};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    domain::{ChatEvent, Connection, ConnectionError, ConnectionId},
    infrastructure::dto::websocket::ChatEventDto,
};

/// Outbound adapter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundConfig {
    /// Maximum number of pending events per connection
    pub queue_capacity: usize,
    /// Ping the peer when nothing was written for this long
    pub ping_interval: Duration,
    /// Drop the peer when nothing was received for this long
    pub pong_wait: Duration,
    /// Upper bound for a single frame write
    pub write_wait: Duration,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 128,
            ping_interval: Duration::from_secs(30),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// State shared between the adapter handle and its writer task
struct Liveness {
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    started: Instant,
    /// Last inbound activity, in milliseconds since `started`
    last_seen_ms: AtomicU64,
}

impl Liveness {
    /// Returns true for the call that actually closed the connection
    fn mark_closed(&self) -> bool {
        let first = self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.shutdown.send_replace(true);
        }
        first
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_seen_ms.store(elapsed, Ordering::Release);
    }

    /// True if the peer sent anything at or after `at`
    fn seen_since(&self, at: Instant) -> bool {
        let at_ms = at.saturating_duration_since(self.started).as_millis() as u64;
        self.last_seen_ms.load(Ordering::Acquire) >= at_ms
    }

    fn idle_for(&self) -> Duration {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_seen_ms.load(Ordering::Acquire);
        Duration::from_millis(now.saturating_sub(last))
    }
}

/// Connection implementation that owns a transport sink and its write queue
pub struct OutboundAdapter {
    id: ConnectionId,
    tx: mpsc::Sender<ChatEvent>,
    liveness: Arc<Liveness>,
}

impl OutboundAdapter {
    /// Wrap `sink` and start its writer task.
    ///
    /// The writer ends when the adapter is closed, when the peer stops
    /// answering, when a write fails, or when the adapter handle is dropped.
    pub fn spawn<S>(sink: S, config: OutboundConfig) -> (Arc<Self>, JoinHandle<()>)
    where
        S: Sink<Message> + Send + 'static,
        S::Error: fmt::Display + Send,
    {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let liveness = Arc::new(Liveness {
            closed: AtomicBool::new(false),
            shutdown,
            started: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        });
        let adapter = Arc::new(Self {
            id: ConnectionId::next(),
            tx,
            liveness: liveness.clone(),
        });
        let handle = tokio::spawn(write_loop(
            adapter.id,
            sink,
            rx,
            shutdown_rx,
            liveness,
            config,
        ));
        (adapter, handle)
    }

    /// Refresh the liveness clock. Call on every inbound frame (pong included).
    pub fn record_activity(&self) {
        self.liveness.touch();
    }

    /// Resolves once the adapter is closed, for whatever reason
    pub async fn closed(&self) {
        let mut rx = self.liveness.shutdown.subscribe();
        let already = *rx.borrow_and_update();
        if already {
            return;
        }
        while rx.changed().await.is_ok() {
            let closed = *rx.borrow_and_update();
            if closed {
                return;
            }
        }
    }
}

impl Connection for OutboundAdapter {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, event: ChatEvent) -> Result<(), ConnectionError> {
        if self.liveness.is_closed() {
            return Err(ConnectionError::Closed);
        }
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Outbound queue of {} is full, dropping connection", self.id);
                self.liveness.mark_closed();
                Err(ConnectionError::SlowConsumer)
            }
            Err(TrySendError::Closed(_)) => {
                self.liveness.mark_closed();
                Err(ConnectionError::Closed)
            }
        }
    }

    fn close(&self) -> Result<(), ConnectionError> {
        if self.liveness.mark_closed() {
            tracing::debug!("Closing {}", self.id);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.liveness.is_closed()
    }
}

async fn write_loop<S>(
    id: ConnectionId,
    sink: S,
    mut rx: mpsc::Receiver<ChatEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    liveness: Arc<Liveness>,
    config: OutboundConfig,
) where
    S: Sink<Message> + Send + 'static,
    S::Error: fmt::Display + Send,
{
    let mut sink = Box::pin(sink);
    let mut ticker = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_write = Instant::now();
    // Oldest ping the peer has not answered yet
    let mut unanswered_ping: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,

            event = rx.recv() => {
                let Some(event) = event else { break };
                let dto: ChatEventDto = event.into();
                let json = match serde_json::to_string(&dto) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize event for {}: {}", id, e);
                        continue;
                    }
                };
                match tokio::time::timeout(config.write_wait, sink.send(Message::Text(json.into()))).await {
                    Ok(Ok(())) => last_write = Instant::now(),
                    Ok(Err(e)) => {
                        tracing::debug!("Write to {} failed: {}", id, e);
                        break;
                    }
                    Err(_) => {
                        tracing::warn!("Write to {} timed out", id);
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if let Some(sent) = unanswered_ping {
                    if liveness.seen_since(sent) {
                        unanswered_ping = None;
                    } else if sent.elapsed() >= config.pong_wait {
                        tracing::warn!(
                            "No answer from {} for {:?} after ping, dropping connection",
                            id,
                            sent.elapsed()
                        );
                        break;
                    }
                }
                // Ping when the write side is quiet, or when the peer is quiet
                // even though events keep flowing to it.
                let write_idle = last_write.elapsed() >= config.ping_interval;
                let read_idle = liveness.idle_for() >= config.ping_interval;
                if write_idle || read_idle {
                    let ping = sink.send(Message::Ping(Bytes::new()));
                    if !matches!(tokio::time::timeout(config.write_wait, ping).await, Ok(Ok(()))) {
                        tracing::debug!("Ping to {} failed", id);
                        break;
                    }
                    last_write = Instant::now();
                    unanswered_ping.get_or_insert(Instant::now());
                    tracing::debug!("Sent ping to {}", id);
                }
            }
        }
    }

    liveness.mark_closed();
    // Release the queue before the (possibly slow) close handshake.
    drop(rx);
    let _ = tokio::time::timeout(config.write_wait, async {
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    })
    .await;
    tracing::debug!("Writer of {} stopped", id);
}

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    use super::*;
    use crate::domain::{RoomId, Timestamp, UserId};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - イベントが JSON テキストフレームとして順番通りに書き込まれること
    // - keep-alive（Ping 送信、pong-wait 超過での切断）
    // - キュー満杯時に送信側をブロックせず接続を切断すること
    // - close の冪等性
    // ========================================

    /// Sink that forwards every frame to a channel
    struct ChannelSink(mpsc::UnboundedSender<Message>);

    impl Sink<Message> for ChannelSink {
        type Error = String;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), String> {
            self.0.send(item).map_err(|e| e.to_string())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Sink of a peer that never reads
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = String;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), String> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Pending
        }
    }

    fn config() -> OutboundConfig {
        OutboundConfig {
            queue_capacity: 8,
            ping_interval: Duration::from_secs(30),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }

    fn event(ts: i64) -> ChatEvent {
        ChatEvent::user_joined(RoomId::generate(), UserId::generate(), Timestamp::new(ts))
    }

    fn spawn_adapter(
        config: OutboundConfig,
    ) -> (Arc<OutboundAdapter>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (adapter, _handle) = OutboundAdapter::spawn(ChannelSink(tx), config);
        (adapter, rx)
    }

    #[tokio::test]
    async fn test_events_are_written_as_json_in_order() {
        // テスト項目: 送信したイベントが JSON テキストフレームとして送信順に書き込まれる
        // given (前提条件):
        let (adapter, mut frames) = spawn_adapter(config());

        // when (操作):
        for ts in 0..5 {
            adapter.send(event(ts)).unwrap();
        }

        // then (期待する結果):
        for ts in 0..5 {
            let Some(Message::Text(text)) = frames.recv().await else {
                panic!("expected a text frame");
            };
            let dto: ChatEventDto = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(
                dto.timestamp,
                hiroba_shared::time::timestamp_to_rfc3339(ts)
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_sent_when_idle() {
        // テスト項目: ping_interval の間書き込みが無ければ Ping フレームが送られる
        // given (前提条件):
        let (adapter, mut frames) = spawn_adapter(config());

        // when (操作):
        tokio::time::sleep(Duration::from_secs(31)).await;

        // then (期待する結果):
        assert!(matches!(frames.try_recv(), Ok(Message::Ping(_))));
        assert!(!adapter.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_write_suppresses_ping() {
        // テスト項目: 直前に書き込みがあり、クライアントからの受信も続いていれば Ping は送られない
        // given (前提条件):
        let (adapter, mut frames) = spawn_adapter(config());

        // when (操作):
        tokio::time::sleep(Duration::from_secs(25)).await;
        adapter.record_activity();
        adapter.send(event(1)).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        // then (期待する結果):
        assert!(matches!(frames.try_recv(), Ok(Message::Text(_))));
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_is_dropped_after_pong_wait() {
        // テスト項目: pong-wait を超えてクライアントから何も届かなければ切断される
        // given (前提条件):
        let (adapter, mut frames) = spawn_adapter(config());

        // when (操作):
        tokio::time::sleep(Duration::from_secs(100)).await;

        // then (期待する結果):
        assert!(adapter.is_closed());
        assert_eq!(adapter.send(event(1)), Err(ConnectionError::Closed));
        let mut saw_close = false;
        while let Ok(frame) = frames.try_recv() {
            saw_close |= matches!(frame, Message::Close(_));
        }
        assert!(saw_close);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_keeps_connection_alive() {
        // テスト項目: 受信があるたびに生存確認の時計が進み、切断されない
        // given (前提条件):
        let (adapter, _frames) = spawn_adapter(config());

        // when (操作):
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(20)).await;
            adapter.record_activity();
        }

        // then (期待する結果):
        assert!(!adapter.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_passive_listener_in_busy_room_stays_connected() {
        // テスト項目: 10 秒ごとにイベントが流れ続ける Room で、自分からは何も送らず Ping にだけ Pong を返すクライアントは切断されない
        // given (前提条件):
        let (adapter, mut frames) = spawn_adapter(config());
        let mut pings = 0;

        // when (操作):
        for ts in 0..12 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            adapter.send(event(ts)).unwrap();
            tokio::task::yield_now().await;
            while let Ok(frame) = frames.try_recv() {
                if matches!(frame, Message::Ping(_)) {
                    pings += 1;
                    // Pong の受信
                    adapter.record_activity();
                }
            }
        }

        // then (期待する結果):
        assert!(pings > 0);
        assert!(!adapter.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_room_drops_listener_that_ignores_pings() {
        // テスト項目: イベントが流れ続けていても、Ping に応答しないクライアントは pong-wait 後に切断される
        // given (前提条件):
        let (adapter, mut frames) = spawn_adapter(config());
        let mut pings = 0;

        // when (操作):
        for ts in 0..15 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let _ = adapter.send(event(ts));
            tokio::task::yield_now().await;
            while let Ok(frame) = frames.try_recv() {
                pings += usize::from(matches!(frame, Message::Ping(_)));
            }
        }

        // then (期待する結果):
        assert!(pings > 0);
        assert!(adapter.is_closed());
    }

    #[tokio::test]
    async fn test_full_queue_drops_slow_consumer() {
        // テスト項目: 書き込めないクライアントのキューが満杯になると、送信はブロックせず接続を切断する
        // given (前提条件):
        let config = OutboundConfig {
            queue_capacity: 2,
            ..config()
        };
        let (adapter, _handle) = OutboundAdapter::spawn(StalledSink, config);
        adapter.send(event(1)).unwrap();
        adapter.send(event(2)).unwrap();

        // when (操作):
        let overflow = adapter.send(event(3));

        // then (期待する結果):
        assert_eq!(overflow, Err(ConnectionError::SlowConsumer));
        assert!(adapter.is_closed());
        assert_eq!(adapter.send(event(4)), Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_writer() {
        // テスト項目: close は何度呼んでも成功し、writer タスクが停止して Close フレームが送られる
        // given (前提条件):
        let (tx, mut frames) = mpsc::unbounded_channel();
        let (adapter, handle) = OutboundAdapter::spawn(ChannelSink(tx), config());

        // when (操作):
        let first = adapter.close();
        let second = adapter.close();
        handle.await.unwrap();

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(adapter.is_closed());
        assert!(matches!(frames.recv().await, Some(Message::Close(None))));
        adapter.closed().await;
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        // テスト項目: closed() は close 後に解決する
        // given (前提条件):
        let (adapter, _frames) = spawn_adapter(config());
        let waiter = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.closed().await })
        };

        // when (操作):
        adapter.close().unwrap();

        // then (期待する結果):
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() should resolve")
            .unwrap();
    }
}
