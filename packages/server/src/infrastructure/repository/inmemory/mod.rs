//! InMemory 実装
//!
//! ドメイン層が定義する collaborator trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。単一プロセスでサーバーを動かすため、
//! およびテストのためのものです。

mod message_store;
mod room_directory;
mod token_validator;

pub use message_store::InMemoryMessageStore;
pub use room_directory::InMemoryRoomDirectory;
pub use token_validator::InMemoryTokenValidator;
