//! Project management.
//!
//! Projects group logs. Names are trimmed, must be non-blank and are unique
//! (case-sensitive). A project cannot be deleted while it owns any log, and
//! the last remaining project cannot be deleted at all.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::clock::now_millis;
use crate::error::StoreError;

/// A project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn normalize_name(name: &str) -> Result<&str, StoreError> {
    let value = name.trim();
    if value.is_empty() {
        return Err(StoreError::Validation(
            "Project name must not be blank.".into(),
        ));
    }
    Ok(value)
}

/// Id of the project called exactly `name`, if any.
fn find_by_name(conn: &rusqlite::Connection, name: &str) -> Result<Option<i64>, StoreError> {
    conn.query_row(
        "SELECT id FROM project WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| StoreError::Database(format!("failed to look up project name: {e}")))
}

/// Create a project and return its id.
///
/// # Errors
///
/// - [`StoreError::Validation`] if the trimmed name is blank.
/// - [`StoreError::Conflict`] if a project with that name exists.
/// - [`StoreError::Database`] if the INSERT fails.
pub fn add_project(conn: &rusqlite::Connection, name: &str) -> Result<i64, StoreError> {
    let value = normalize_name(name)?;
    if find_by_name(conn, value)?.is_some() {
        return Err(StoreError::Conflict(format!(
            "A project named \"{value}\" already exists."
        )));
    }

    let now = now_millis();
    conn.execute(
        "INSERT INTO project (name, created_at, updated_at) VALUES (?1, ?2, ?3)",
        params![value, now, now],
    )
    .map_err(|e| StoreError::Database(format!("failed to create project: {e}")))?;

    Ok(conn.last_insert_rowid())
}

/// Rename a project. Renaming to its current name succeeds.
///
/// # Errors
///
/// - [`StoreError::Validation`] if the trimmed name is blank.
/// - [`StoreError::NotFound`] if `id` does not exist.
/// - [`StoreError::Conflict`] if another project already has the name.
pub fn rename_project(conn: &rusqlite::Connection, id: i64, name: &str) -> Result<(), StoreError> {
    let value = normalize_name(name)?;
    let current = get_project(conn, id)?
        .ok_or_else(|| StoreError::NotFound(format!("Project {id} does not exist.")))?;

    if current.name != value && find_by_name(conn, value)?.is_some() {
        return Err(StoreError::Conflict(format!(
            "A project named \"{value}\" already exists."
        )));
    }

    conn.execute(
        "UPDATE project SET name = ?1, updated_at = ?2 WHERE id = ?3",
        params![value, now_millis(), id],
    )
    .map_err(|e| StoreError::Database(format!("failed to rename project: {e}")))?;

    Ok(())
}

/// Delete a project.
///
/// # Errors
///
/// - [`StoreError::NotFound`] if `id` does not exist.
/// - [`StoreError::Precondition`] if any log, trashed or not, references the
///   project, or if it is the only project left.
pub fn delete_project(conn: &rusqlite::Connection, id: i64) -> Result<(), StoreError> {
    if get_project(conn, id)?.is_none() {
        return Err(StoreError::NotFound(format!("Project {id} does not exist.")));
    }

    let logs = count_logs_by_project(conn, id)?;
    if logs > 0 {
        return Err(StoreError::Precondition(format!(
            "The project still has {logs} log(s) and cannot be deleted."
        )));
    }

    let projects: i64 = conn
        .query_row("SELECT COUNT(*) FROM project", [], |row| row.get(0))
        .map_err(|e| StoreError::Database(format!("failed to count projects: {e}")))?;
    if projects <= 1 {
        return Err(StoreError::Precondition(
            "At least one project must be kept.".into(),
        ));
    }

    conn.execute("DELETE FROM project WHERE id = ?1", params![id])
        .map_err(|e| StoreError::Database(format!("failed to delete project: {e}")))?;

    Ok(())
}

/// Fetch one project.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn get_project(conn: &rusqlite::Connection, id: i64) -> Result<Option<Project>, StoreError> {
    conn.query_row(
        "SELECT id, name, created_at, updated_at FROM project WHERE id = ?1",
        params![id],
        row_to_project,
    )
    .optional()
    .map_err(|e| StoreError::Database(format!("failed to fetch project: {e}")))
}

/// All projects, most recently updated first.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn list_projects(conn: &rusqlite::Connection) -> Result<Vec<Project>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, created_at, updated_at FROM project \
             ORDER BY updated_at DESC, id DESC",
        )
        .map_err(|e| StoreError::Database(format!("failed to prepare project query: {e}")))?;

    let rows = stmt
        .query_map([], row_to_project)
        .map_err(|e| StoreError::Database(format!("failed to query projects: {e}")))?;

    let mut items = Vec::new();
    for row in rows {
        items.push(
            row.map_err(|e| StoreError::Database(format!("failed to read project row: {e}")))?,
        );
    }
    Ok(items)
}

/// Number of logs owned by a project, including trashed ones.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn count_logs_by_project(conn: &rusqlite::Connection, id: i64) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT COUNT(*) FROM construction_log WHERE project_id = ?1",
        params![id],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Database(format!("failed to count logs: {e}")))
}
