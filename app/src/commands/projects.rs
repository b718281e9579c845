//! Project commands, plus selection of the current project.

use serde::Serialize;
use sitelog_store::{Project, StoreError};
use tokio::sync::watch;

use super::{with_store, CommandError};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithCountDto {
    #[serde(flatten)]
    pub project: Project,
    /// Logs owned by the project, trashed ones included.
    pub log_count: i64,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// All projects with their log counts, most recently updated first.
///
/// # Errors
///
/// `STORE_CLOSED` or a storage error.
pub async fn list_projects(state: &AppState) -> Result<Vec<ProjectWithCountDto>, CommandError> {
    with_store(state, |store| {
        store
            .list_projects()?
            .into_iter()
            .map(|project| -> Result<ProjectWithCountDto, StoreError> {
                let log_count = store.count_logs_by_project(project.id)?;
                Ok(ProjectWithCountDto { project, log_count })
            })
            .collect()
    })
    .await
}

/// Create a project and select it.
///
/// # Errors
///
/// `VALIDATION` for a blank name, `CONFLICT` for a duplicate.
pub async fn add_project(state: &AppState, name: String) -> Result<i64, CommandError> {
    let id = with_store(state, move |store| store.add_project(&name)).await?;
    state.session()?.select(id);
    Ok(id)
}

/// Rename a project.
///
/// # Errors
///
/// `VALIDATION`, `NOT_FOUND` or `CONFLICT`.
pub async fn rename_project(state: &AppState, id: i64, name: String) -> Result<(), CommandError> {
    with_store(state, move |store| store.rename_project(id, &name)).await
}

/// Delete an empty project. The selection moves on if it pointed here.
///
/// # Errors
///
/// `NOT_FOUND`, or `PRECONDITION` if the project still owns logs or is the
/// last one.
pub async fn delete_project(state: &AppState, id: i64) -> Result<Option<i64>, CommandError> {
    let remaining = with_store(state, move |store| {
        store.delete_project(id)?;
        store.list_projects()
    })
    .await?;
    Ok(state.session()?.resolve(&remaining))
}

/// Make `id` the current project.
///
/// # Errors
///
/// `NOT_FOUND` if the project does not exist.
pub async fn select_project(state: &AppState, id: i64) -> Result<(), CommandError> {
    let exists = with_store(state, move |store| store.get_project(id)).await?;
    if exists.is_none() {
        return Err(CommandError::new("NOT_FOUND", format!("Project {id} does not exist.")));
    }
    state.session()?.select(id);
    Ok(())
}

/// The current project, resolved against the live list.
///
/// # Errors
///
/// `STORE_CLOSED` or a storage error.
pub async fn current_project(state: &AppState) -> Result<Option<i64>, CommandError> {
    let projects = with_store(state, |store| store.list_projects()).await?;
    Ok(state.session()?.resolve(&projects))
}

/// Live project list.
///
/// # Errors
///
/// `STORE_CLOSED` or a storage error.
pub async fn observe_projects(
    state: &AppState,
) -> Result<watch::Receiver<Vec<Project>>, CommandError> {
    with_store(state, |store| store.observe_projects()).await
}
