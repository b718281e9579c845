//! Log commands: editor save, lookups, trash lifecycle, live lists.

use sitelog_store::{LogDraft, LogWithImages};
use tokio::sync::watch;

use super::{with_store, CommandError};
use crate::state::AppState;

/// Create (`existing_id == None`) or overwrite a log. Returns its id.
///
/// # Errors
///
/// `VALIDATION` for blank location or content, `NOT_FOUND` for an unknown
/// project or log.
pub async fn save_log(
    state: &AppState,
    existing_id: Option<i64>,
    draft: LogDraft,
) -> Result<i64, CommandError> {
    with_store(state, move |store| store.save_log(existing_id, &draft)).await
}

/// One log with its images.
///
/// # Errors
///
/// `NOT_FOUND` if the log does not exist.
pub async fn get_log(state: &AppState, id: i64) -> Result<LogWithImages, CommandError> {
    with_store(state, move |store| store.get_log(id))
        .await?
        .ok_or_else(|| CommandError::new("NOT_FOUND", format!("Log {id} does not exist.")))
}

/// Active logs of a project with `start <= date < end`, oldest first.
///
/// # Errors
///
/// `VALIDATION` if `end < start`.
pub async fn logs_in_date_range(
    state: &AppState,
    project_id: i64,
    start: i64,
    end: i64,
) -> Result<Vec<LogWithImages>, CommandError> {
    if end < start {
        return Err(CommandError::new(
            "VALIDATION",
            "The end date must not be before the start date.",
        ));
    }
    with_store(state, move |store| store.logs_in_date_range(project_id, start, end)).await
}

/// Soft-delete a log.
///
/// # Errors
///
/// `NOT_FOUND` if the log does not exist.
pub async fn move_to_trash(state: &AppState, id: i64) -> Result<(), CommandError> {
    with_store(state, move |store| store.move_to_trash(id)).await
}

/// Bring a log back from the trash.
///
/// # Errors
///
/// `NOT_FOUND` if the log does not exist.
pub async fn restore_log(state: &AppState, id: i64) -> Result<(), CommandError> {
    with_store(state, move |store| store.restore_log(id)).await
}

/// Hard-delete a log and its image rows.
///
/// # Errors
///
/// `NOT_FOUND` if the log does not exist.
pub async fn delete_forever(state: &AppState, id: i64) -> Result<(), CommandError> {
    with_store(state, move |store| store.delete_forever(id)).await
}

/// Live active logs of a project, newest date first.
///
/// # Errors
///
/// `STORE_CLOSED` or a storage error.
pub async fn observe_active_logs(
    state: &AppState,
    project_id: i64,
) -> Result<watch::Receiver<Vec<LogWithImages>>, CommandError> {
    with_store(state, move |store| store.observe_active_logs(project_id)).await
}

/// Live trash of a project, most recently deleted first.
///
/// # Errors
///
/// `STORE_CLOSED` or a storage error.
pub async fn observe_trash(
    state: &AppState,
    project_id: i64,
) -> Result<watch::Receiver<Vec<LogWithImages>>, CommandError> {
    with_store(state, move |store| store.observe_trash(project_id)).await
}
