//! Async command handlers consumed by the UI layer.
//!
//! Each submodule defines `async fn` commands taking the managed
//! [`AppState`](crate::state::AppState). Store work runs on the blocking
//! pool; errors cross the boundary as a serialisable [`CommandError`].

pub mod backup;
pub mod logs;
pub mod media;
pub mod projects;
pub mod settings;

use serde::{Deserialize, Serialize};
use sitelog_store::{LogStore, StoreError};
use thiserror::Error;
use tracing::error;

use crate::state::AppState;

/// Error DTO returned by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct CommandError {
    /// Machine-readable error code.
    pub code: String,
    /// User-facing error message.
    pub message: String,
}

impl CommandError {
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn store_closed() -> Self {
        Self::new(
            "STORE_CLOSED",
            "Data was restored from a backup. Restart the app to continue.",
        )
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    #[must_use]
    pub fn lock_poisoned(what: &str) -> Self {
        Self::internal(format!("Internal error: failed to acquire {what} lock"))
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::Validation(_) => "VALIDATION",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Precondition(_) => "PRECONDITION",
            StoreError::Format(_) => "FORMAT",
            StoreError::Integrity(_) => "INTEGRITY",
            StoreError::UnsupportedVersion(_) => "VERSION",
            StoreError::Io(_) => "IO_ERROR",
            StoreError::Crypto(_)
            | StoreError::Database(_)
            | StoreError::InvalidKey
            | StoreError::Migration(_) => "INTERNAL_ERROR",
        };
        if !err.is_user_facing() {
            error!(error = %err, "command failed");
        }
        Self::new(code, err.user_message())
    }
}

/// Run `f` against the open store on the blocking pool.
pub(crate) async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, CommandError>
where
    T: Send + 'static,
    F: FnOnce(&LogStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store()?;
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| CommandError::internal(format!("Store task failed: {e}")))?
        .map_err(CommandError::from)
}
