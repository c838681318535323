//! UseCase: トークン認証
//!
//! 接続前と履歴取得前に呼ばれます。トークンの発行や検証方式は外部の責務で、
//! ここでは検証結果をユースケースのエラーに変換するだけです。

use std::{sync::Arc, time::Duration};

use crate::domain::{AuthenticatedUser, RepositoryError, TokenValidator};

use super::{deadline::with_deadline, error::AuthError};

pub struct AuthenticateUseCase {
    validator: Arc<dyn TokenValidator>,
    timeout: Duration,
}

impl AuthenticateUseCase {
    pub fn new(validator: Arc<dyn TokenValidator>, timeout: Duration) -> Self {
        Self { validator, timeout }
    }

    pub async fn execute(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        match with_deadline(self.timeout, self.validator.validate_token(token)).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::InvalidToken) => Err(AuthError::InvalidToken),
            Err(e) => {
                tracing::warn!("Token validation failed: {}", e);
                Err(AuthError::Unavailable(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        domain::{MockTokenValidator, UserId},
        infrastructure::repository::InMemoryTokenValidator,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_known_token_resolves_user() {
        // テスト項目: 登録済みトークンはユーザーに解決される
        // given (前提条件):
        let validator = Arc::new(InMemoryTokenValidator::new());
        let user_id = UserId::generate();
        validator
            .insert("token-a", user_id, vec!["chat".to_string()])
            .await;
        let usecase = AuthenticateUseCase::new(validator, TIMEOUT);

        // when (操作):
        let user = usecase.execute("token-a").await.unwrap();

        // then (期待する結果):
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.permissions, vec!["chat".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_or_blank_token_is_rejected() {
        // テスト項目: 未登録トークンと空トークンは InvalidToken になる
        // given (前提条件):
        let usecase = AuthenticateUseCase::new(Arc::new(InMemoryTokenValidator::new()), TIMEOUT);

        // when (操作):
        let unknown = usecase.execute("nope").await;
        let blank = usecase.execute("").await;

        // then (期待する結果):
        assert_eq!(unknown, Err(AuthError::InvalidToken));
        assert_eq!(blank, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_validator_failure_is_unavailable() {
        // テスト項目: 認証サービスの障害は InvalidToken と区別して返る
        // given (前提条件):
        let mut validator = MockTokenValidator::new();
        validator
            .expect_validate_token()
            .returning(|_| Err(RepositoryError::Unavailable("auth down".to_string())));
        let usecase = AuthenticateUseCase::new(Arc::new(validator), TIMEOUT);

        // when (操作):
        let result = usecase.execute("token-a").await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(AuthError::Unavailable(RepositoryError::Unavailable(
                "auth down".to_string()
            )))
        );
    }
}
