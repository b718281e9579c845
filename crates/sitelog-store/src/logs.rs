//! Construction log CRUD and queries.
//!
//! Saving a log rewrites its whole image set: every prior image row for the
//! log is deleted and the caller-supplied list is inserted in order. The list
//! is taken as-is, duplicates included.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::clock::now_millis;
use crate::error::StoreError;
use crate::projects;

/// A log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionLog {
    pub id: i64,
    pub project_id: i64,
    /// Day of the log, epoch milliseconds at local midnight.
    pub date: i64,
    pub weather: String,
    pub location: String,
    pub content: String,
    pub workers: Option<i32>,
    pub worker_names: String,
    pub safety: String,
    pub remark: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
    pub deleted_at: Option<i64>,
}

/// An image attached to a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogImage {
    pub id: i64,
    pub log_id: i64,
    pub image_uri: String,
    pub created_at: i64,
}

/// A log together with its images, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogWithImages {
    pub log: ConstructionLog,
    pub images: Vec<LogImage>,
}

impl LogWithImages {
    /// Image URIs in insertion order.
    #[must_use]
    pub fn image_uris(&self) -> Vec<&str> {
        self.images.iter().map(|i| i.image_uri.as_str()).collect()
    }
}

/// Editable fields of a log, as submitted by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogDraft {
    pub project_id: i64,
    pub date: i64,
    pub weather: String,
    pub location: String,
    pub content: String,
    pub workers: Option<i32>,
    pub worker_names: String,
    pub safety: String,
    pub remark: String,
    pub image_uris: Vec<String>,
}

const LOG_COLUMNS: &str = "id, project_id, date, weather, location, content, workers, \
     worker_names, safety, remark, created_at, updated_at, deleted, deleted_at";

fn row_to_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConstructionLog> {
    Ok(ConstructionLog {
        id: row.get(0)?,
        project_id: row.get(1)?,
        date: row.get(2)?,
        weather: row.get(3)?,
        location: row.get(4)?,
        content: row.get(5)?,
        workers: row.get(6)?,
        worker_names: row.get(7)?,
        safety: row.get(8)?,
        remark: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        deleted: row.get(12)?,
        deleted_at: row.get(13)?,
    })
}

fn validate(draft: &LogDraft) -> Result<(), StoreError> {
    if draft.location.trim().is_empty() {
        return Err(StoreError::Validation("Location must not be blank.".into()));
    }
    if draft.content.trim().is_empty() {
        return Err(StoreError::Validation("Content must not be blank.".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Insert (`existing_id == None`) or overwrite a log, then replace its image
/// set. Runs in one transaction. Returns the log id.
///
/// # Errors
///
/// - [`StoreError::Validation`] if location or content is blank.
/// - [`StoreError::NotFound`] if the project or `existing_id` is absent.
/// - [`StoreError::Database`] if a statement fails.
pub fn save_log(
    conn: &rusqlite::Connection,
    existing_id: Option<i64>,
    draft: &LogDraft,
) -> Result<i64, StoreError> {
    validate(draft)?;
    if projects::get_project(conn, draft.project_id)?.is_none() {
        return Err(StoreError::NotFound(format!(
            "Project {} does not exist.",
            draft.project_id
        )));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StoreError::Database(format!("failed to start transaction: {e}")))?;
    let now = now_millis();

    let log_id = match existing_id {
        None => {
            tx.execute(
                "INSERT INTO construction_log (project_id, date, weather, location, content, \
                 workers, worker_names, safety, remark, created_at, updated_at, deleted, deleted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, 0, NULL)",
                params![
                    draft.project_id,
                    draft.date,
                    draft.weather,
                    draft.location,
                    draft.content,
                    draft.workers,
                    draft.worker_names,
                    draft.safety,
                    draft.remark,
                    now,
                ],
            )
            .map_err(|e| StoreError::Database(format!("failed to insert log: {e}")))?;
            tx.last_insert_rowid()
        }
        Some(id) => {
            let updated = tx
                .execute(
                    "UPDATE construction_log SET project_id = ?1, date = ?2, weather = ?3, \
                     location = ?4, content = ?5, workers = ?6, worker_names = ?7, \
                     safety = ?8, remark = ?9, updated_at = ?10 WHERE id = ?11",
                    params![
                        draft.project_id,
                        draft.date,
                        draft.weather,
                        draft.location,
                        draft.content,
                        draft.workers,
                        draft.worker_names,
                        draft.safety,
                        draft.remark,
                        now,
                        id,
                    ],
                )
                .map_err(|e| StoreError::Database(format!("failed to update log: {e}")))?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("Log {id} does not exist.")));
            }
            id
        }
    };

    tx.execute("DELETE FROM log_image WHERE log_id = ?1", params![log_id])
        .map_err(|e| StoreError::Database(format!("failed to clear log images: {e}")))?;
    {
        let mut insert = tx
            .prepare("INSERT INTO log_image (log_id, image_uri, created_at) VALUES (?1, ?2, ?3)")
            .map_err(|e| StoreError::Database(format!("failed to prepare image insert: {e}")))?;
        for uri in &draft.image_uris {
            insert
                .execute(params![log_id, uri, now])
                .map_err(|e| StoreError::Database(format!("failed to insert image: {e}")))?;
        }
    }

    tx.commit()
        .map_err(|e| StoreError::Database(format!("failed to commit log: {e}")))?;
    Ok(log_id)
}

/// Delete every log (images cascade) and every project.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a DELETE fails.
pub fn clear_all_data(conn: &rusqlite::Connection) -> Result<(), StoreError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StoreError::Database(format!("failed to start transaction: {e}")))?;
    tx.execute("DELETE FROM construction_log", [])
        .map_err(|e| StoreError::Database(format!("failed to clear logs: {e}")))?;
    tx.execute("DELETE FROM project", [])
        .map_err(|e| StoreError::Database(format!("failed to clear projects: {e}")))?;
    tx.commit()
        .map_err(|e| StoreError::Database(format!("failed to commit clear: {e}")))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn images_for(conn: &rusqlite::Connection, log_id: i64) -> Result<Vec<LogImage>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, log_id, image_uri, created_at FROM log_image \
             WHERE log_id = ?1 ORDER BY id ASC",
        )
        .map_err(|e| StoreError::Database(format!("failed to prepare image query: {e}")))?;

    let rows = stmt
        .query_map(params![log_id], |row| {
            Ok(LogImage {
                id: row.get(0)?,
                log_id: row.get(1)?,
                image_uri: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .map_err(|e| StoreError::Database(format!("failed to query images: {e}")))?;

    let mut images = Vec::new();
    for row in rows {
        images.push(
            row.map_err(|e| StoreError::Database(format!("failed to read image row: {e}")))?,
        );
    }
    Ok(images)
}

fn query_logs(
    conn: &rusqlite::Connection,
    where_order: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<LogWithImages>, StoreError> {
    let sql = format!("SELECT {LOG_COLUMNS} FROM construction_log {where_order}");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StoreError::Database(format!("failed to prepare log query: {e}")))?;

    let rows = stmt
        .query_map(args, row_to_log)
        .map_err(|e| StoreError::Database(format!("failed to query logs: {e}")))?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(row.map_err(|e| StoreError::Database(format!("failed to read log row: {e}")))?);
    }

    logs.into_iter()
        .map(|log| {
            let images = images_for(conn, log.id)?;
            Ok(LogWithImages { log, images })
        })
        .collect()
}

/// Point lookup by id, trashed or not.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn get_log(conn: &rusqlite::Connection, id: i64) -> Result<Option<LogWithImages>, StoreError> {
    let log = conn
        .query_row(
            &format!("SELECT {LOG_COLUMNS} FROM construction_log WHERE id = ?1"),
            params![id],
            row_to_log,
        )
        .optional()
        .map_err(|e| StoreError::Database(format!("failed to fetch log: {e}")))?;

    match log {
        Some(log) => {
            let images = images_for(conn, log.id)?;
            Ok(Some(LogWithImages { log, images }))
        }
        None => Ok(None),
    }
}

/// Active logs of a project, newest date first.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn list_active_logs(
    conn: &rusqlite::Connection,
    project_id: i64,
) -> Result<Vec<LogWithImages>, StoreError> {
    query_logs(
        conn,
        "WHERE deleted = 0 AND project_id = ?1 ORDER BY date DESC, id DESC",
        params![project_id],
    )
}

/// Trashed logs of a project, most recently trashed first.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn list_trashed_logs(
    conn: &rusqlite::Connection,
    project_id: i64,
) -> Result<Vec<LogWithImages>, StoreError> {
    query_logs(
        conn,
        "WHERE deleted = 1 AND project_id = ?1 ORDER BY deleted_at DESC, id DESC",
        params![project_id],
    )
}

/// Active logs of a project with `start <= date < end`, oldest first.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn logs_in_date_range(
    conn: &rusqlite::Connection,
    project_id: i64,
    start: i64,
    end: i64,
) -> Result<Vec<LogWithImages>, StoreError> {
    query_logs(
        conn,
        "WHERE deleted = 0 AND project_id = ?1 AND date >= ?2 AND date < ?3 \
         ORDER BY date ASC, id ASC",
        params![project_id, start, end],
    )
}

/// Every image URI referenced by any log, trashed logs included.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the query fails.
pub fn referenced_image_uris(conn: &rusqlite::Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT image_uri FROM log_image")
        .map_err(|e| StoreError::Database(format!("failed to prepare image query: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| StoreError::Database(format!("failed to query image uris: {e}")))?;

    let mut uris = Vec::new();
    for row in rows {
        uris.push(row.map_err(|e| StoreError::Database(format!("failed to read uri: {e}")))?);
    }
    Ok(uris)
}
