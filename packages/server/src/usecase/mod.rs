//! UseCase layer（Chat Service）
//!
//! 接続・切断・メッセージ送信・履歴取得をオーケストレーションします。
//! 各 UseCase は必要なコラボレータ（Room Registry、Message Store、Room Directory、
//! Clock）を構築時に受け取り、プロセス全体で共有される可変状態は持ちません。

mod authenticate;
mod connect_participant;
mod deadline;
mod departure;
mod disconnect_participant;
mod error;
mod get_messages;
mod list_active_rooms;
mod send_message;
#[cfg(test)]
mod test_support;

pub use authenticate::AuthenticateUseCase;
pub use connect_participant::ConnectParticipantUseCase;
pub use deadline::DEFAULT_STORE_TIMEOUT;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{AuthError, ConnectError, DisconnectError, GetMessagesError, SendMessageError};
pub use get_messages::{GetMessagesUseCase, MessagePage};
pub use list_active_rooms::ListActiveRoomsUseCase;
pub use send_message::SendMessageUseCase;
