//! Collaborator trait 定義
//!
//! ドメイン層が必要とする外部コラボレータ（メッセージストア、ルーム存在確認、認証）の
//! インターフェースを定義します。具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! 全ての呼び出しは失敗し得るものとして扱い、UseCase 層は結果を必ず確認します。

use async_trait::async_trait;

use super::{Message, Pagination, Participant, RepositoryError, RoomId, UserId};

/// Message Store trait
///
/// メッセージと参加者行を永続化するストアへのインターフェース。
/// 参加者行の有無が「参加中かどうか」の唯一の根拠になります。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// メッセージを保存し、保存されたメッセージを返す
    async fn create_message(&self, message: Message) -> Result<Message, RepositoryError>;

    /// Room のメッセージを新しい順に取得
    async fn get_room_messages(
        &self,
        room_id: RoomId,
        pagination: Pagination,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// 参加者行を追加（既に存在する場合は joined_at を更新）
    async fn add_participant(&self, participant: Participant) -> Result<(), RepositoryError>;

    /// 参加者行を削除（存在しない場合も成功）
    async fn remove_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<(), RepositoryError>;

    /// 参加者行が存在するか
    async fn is_participant(&self, room_id: RoomId, user_id: UserId)
    -> Result<bool, RepositoryError>;
}

/// Room の存在確認
///
/// Room メタデータ（名前、オーナーなど）の管理は外部に委ね、
/// コアは「存在するかどうか」だけを問い合わせます。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn room_exists(&self, room_id: RoomId) -> Result<bool, RepositoryError>;
}

/// 認証済みユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub permissions: Vec<String>,
}

/// トークン検証
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// トークンを検証し、ユーザーを返す。無効なトークンは `RepositoryError::InvalidToken`
    async fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, RepositoryError>;
}
