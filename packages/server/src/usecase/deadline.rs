//! Deadline for collaborator calls.

use std::{future::Future, time::Duration};

use crate::domain::RepositoryError;

/// Default deadline for one collaborator call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `call`, failing with [`RepositoryError::Timeout`] once `deadline` elapses
pub(crate) async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(RepositoryError::Timeout))
}
