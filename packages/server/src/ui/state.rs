//! Shared application state.

use std::sync::Arc;

use crate::{
    infrastructure::connection::OutboundConfig,
    usecase::{
        AuthenticateUseCase, ConnectParticipantUseCase, DisconnectParticipantUseCase,
        GetMessagesUseCase, ListActiveRoomsUseCase, SendMessageUseCase,
    },
};

/// Use cases and transport settings shared by every handler
pub struct AppState {
    pub authenticate_usecase: Arc<AuthenticateUseCase>,
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    pub send_message_usecase: Arc<SendMessageUseCase>,
    pub get_messages_usecase: Arc<GetMessagesUseCase>,
    pub list_active_rooms_usecase: Arc<ListActiveRoomsUseCase>,
    /// 各 websocket 接続の Outbound Adapter 設定
    pub outbound_config: OutboundConfig,
}
