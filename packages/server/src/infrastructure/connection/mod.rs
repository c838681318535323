//! Connection 実装
//!
//! ## 実装
//!
//! - `outbound`: WebSocket などのトランスポートを包む Outbound Adapter
//!   （上限付きキュー + 専用 writer タスク + keep-alive）
//! - `channel`: プロセス内チャンネルによる接続（テスト、組み込み用途）

pub mod channel;
pub mod outbound;

pub use channel::ChannelConnection;
pub use outbound::{OutboundAdapter, OutboundConfig};
