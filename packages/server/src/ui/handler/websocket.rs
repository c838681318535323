//! WebSocket connection handlers.
//!
//! 1 接続 = 1 セッション。アップグレード前にトークンと Room の存在を確認し、
//! アップグレード後はソケットを分割して書き込み側を [`OutboundAdapter`] に渡します。
//! 読み込みループはこのハンドラが持ち、受信したフレームを SendMessage に流します。

use std::{str::FromStr, sync::Arc};

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::stream::{SplitStream, StreamExt};
use hiroba_shared::time::get_utc_timestamp;
use serde::Deserialize;

use crate::{
    domain::{ChatEvent, Connection, RoomId, SharedConnection, Timestamp, UserId},
    infrastructure::{
        connection::OutboundAdapter,
        dto::websocket::{ClientFrame, ClientFrameType},
    },
    ui::state::AppState,
    usecase::{AuthError, ConnectError, SendMessageError},
};

use super::{ApiError, api_error, auth_error_response, parse_room_id};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. トークン検証（アップグレード前）
    let token = query
        .token
        .ok_or_else(|| auth_error_response(AuthError::InvalidToken))?;
    let user = state
        .authenticate_usecase
        .execute(&token)
        .await
        .map_err(auth_error_response)?;
    let room_id = parse_room_id(&room_id)?;

    // 2. Room の存在確認（アップグレード前）
    state
        .connect_participant_usecase
        .ensure_room_exists(room_id)
        .await
        .map_err(connect_error_response)?;

    let user_id = user.user_id;
    tracing::info!("Upgrading connection of '{}' to room '{}'", user_id, room_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, user_id)))
}

fn connect_error_response(error: ConnectError) -> ApiError {
    match error {
        ConnectError::RoomNotFound(_) => api_error(StatusCode::NOT_FOUND, error.to_string()),
        ConnectError::Persistence(e) => {
            tracing::error!("Room lookup failed: {}", e);
            api_error(StatusCode::SERVICE_UNAVAILABLE, "room directory unavailable")
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: RoomId, user_id: UserId) {
    let (sink, mut stream) = socket.split();
    let (adapter, writer) = OutboundAdapter::spawn(sink, state.outbound_config);
    let connection_id = adapter.id();

    let connection: SharedConnection = adapter.clone();
    if let Err(e) = state
        .connect_participant_usecase
        .execute(room_id, user_id, connection)
        .await
    {
        tracing::warn!(
            "Failed to connect '{}' to room '{}': {}",
            user_id,
            room_id,
            e
        );
        let _ = adapter.close();
        let _ = writer.await;
        return;
    }

    // 読み込みループと、アダプタ側の終了（keep-alive 切れ、キュー溢れ、置き換え）を待つ
    tokio::select! {
        _ = read_loop(&mut stream, &state, &adapter, room_id, user_id) => {
            tracing::debug!("Reader of {} finished", connection_id);
        }
        _ = adapter.closed() => {
            tracing::debug!("Writer of {} finished", connection_id);
        }
    }
    let _ = adapter.close();

    if let Err(e) = state
        .disconnect_participant_usecase
        .execute_session(room_id, user_id, connection_id)
        .await
    {
        tracing::warn!(
            "Disconnect of '{}' from room '{}' was incomplete: {}",
            user_id,
            room_id,
            e
        );
    }

    if let Err(e) = writer.await {
        tracing::error!("Writer task of {} panicked: {}", connection_id, e);
    }
    tracing::info!("Session {} of '{}' ended", connection_id, user_id);
}

async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    state: &AppState,
    adapter: &OutboundAdapter,
    room_id: RoomId,
    user_id: UserId,
) {
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("WebSocket error from '{}': {}", user_id, e);
                break;
            }
        };
        adapter.record_activity();

        let outcome = match frame {
            Message::Text(text) => {
                tracing::debug!("Received text from '{}': {}", user_id, text.as_str());
                handle_text(state, room_id, user_id, text.as_str()).await
            }
            Message::Binary(_) => Err("binary frames are not supported".to_string()),
            Message::Close(_) => {
                tracing::info!("Client '{}' requested close", user_id);
                break;
            }
            // Ping への応答は axum が行う
            Message::Ping(_) | Message::Pong(_) => Ok(()),
        };

        if let Err(reason) = outcome {
            tracing::warn!("Rejected frame from '{}': {}", user_id, reason);
            let event = ChatEvent::error(
                room_id,
                user_id,
                reason,
                Timestamp::new(get_utc_timestamp()),
            );
            if adapter.send(event).is_err() {
                break;
            }
        }
    }
}

/// Any spelling of the connection's room id (case, braces, urn form) matches
fn frame_targets_room(frame_room: &str, room_id: RoomId) -> bool {
    RoomId::from_str(frame_room).is_ok_and(|parsed| parsed == room_id)
}

/// Handle one text frame. `Err` carries the reason sent back as an `error` event.
async fn handle_text(
    state: &AppState,
    room_id: RoomId,
    user_id: UserId,
    text: &str,
) -> Result<(), String> {
    let frame: ClientFrame =
        serde_json::from_str(text).map_err(|e| format!("malformed frame: {}", e))?;

    if frame.r#type != ClientFrameType::Message {
        return Err("unsupported frame type".to_string());
    }
    if let Some(frame_room) = frame.room_id.as_deref()
        && !frame_targets_room(frame_room, room_id)
    {
        return Err(format!(
            "frame room '{}' does not match this connection",
            frame_room
        ));
    }
    if let Some(token) = frame.token.as_deref() {
        let user = state
            .authenticate_usecase
            .execute(token)
            .await
            .map_err(|e| e.to_string())?;
        if user.user_id != user_id {
            return Err("token does not belong to this session".to_string());
        }
    }

    let content = frame.content.unwrap_or_default();
    state
        .send_message_usecase
        .execute(room_id, user_id, content)
        .await
        .map(|_| ())
        .map_err(|e| match e {
            SendMessageError::Persistence(err) => {
                tracing::error!("Failed to store message of '{}': {}", user_id, err);
                "message could not be stored".to_string()
            }
            other => other.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - フレームの room_id は文字列ではなく UUID の値として接続先の Room と比較されること
    // ========================================

    #[test]
    fn test_frame_room_matches_any_uuid_spelling() {
        // テスト項目: 大文字、波括弧付き、urn 形式の room_id も同じ Room として受け付ける
        // given (前提条件):
        let room_id = RoomId::generate();
        let canonical = room_id.to_string();

        // when (操作):
        let spellings = [
            canonical.clone(),
            canonical.to_uppercase(),
            format!("{{{}}}", canonical),
            format!("urn:uuid:{}", canonical),
        ];

        // then (期待する結果):
        for spelling in spellings {
            assert!(frame_targets_room(&spelling, room_id), "{}", spelling);
        }
    }

    #[test]
    fn test_frame_room_rejects_other_or_invalid_room() {
        // テスト項目: 別の Room の id や UUID でない文字列は一致しない
        // given (前提条件):
        let room_id = RoomId::generate();

        // when (操作):
        let other = RoomId::generate().to_string();

        // then (期待する結果):
        assert!(!frame_targets_room(&other, room_id));
        assert!(!frame_targets_room("lobby", room_id));
        assert!(!frame_targets_room("", room_id));
    }
}
