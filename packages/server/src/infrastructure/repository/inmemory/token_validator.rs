//! InMemory Token Validator 実装
//!
//! トークン → ユーザーの対応表を持つだけの実装です。トークンの発行や署名検証は
//! 外部の認証サービスの責務です。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{AuthenticatedUser, RepositoryError, TokenValidator, UserId};

#[derive(Default)]
pub struct InMemoryTokenValidator {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
}

impl InMemoryTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// トークンを登録
    pub async fn insert(&self, token: impl Into<String>, user_id: UserId, permissions: Vec<String>) {
        self.tokens.write().await.insert(
            token.into(),
            AuthenticatedUser {
                user_id,
                permissions,
            },
        );
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }
}

#[async_trait]
impl TokenValidator for InMemoryTokenValidator {
    async fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, RepositoryError> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(RepositoryError::InvalidToken)
    }
}
