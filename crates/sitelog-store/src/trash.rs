//! Soft delete, restore, hard delete, and the retention sweep.
//!
//! A trashed log keeps `deleted = 1` with `deleted_at` set; an active log has
//! `deleted = 0` and `deleted_at` NULL. The schema CHECK enforces the pairing.

use rusqlite::params;
use tracing::info;

use crate::clock::{now_millis, DAY_MS};
use crate::error::StoreError;

/// Default number of days a trashed log is kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

fn not_found(id: i64) -> StoreError {
    StoreError::NotFound(format!("Log {id} does not exist."))
}

/// Move a log to the trash now.
///
/// # Errors
///
/// - [`StoreError::NotFound`] if `id` does not exist.
/// - [`StoreError::Database`] if the UPDATE fails.
pub fn move_to_trash(conn: &rusqlite::Connection, id: i64) -> Result<(), StoreError> {
    move_to_trash_at(conn, id, now_millis())
}

/// Move a log to the trash with an explicit timestamp.
///
/// Trashing an already-trashed log keeps its original `deleted_at`, so the
/// retention clock is not reset.
///
/// # Errors
///
/// Same as [`move_to_trash`].
pub fn move_to_trash_at(
    conn: &rusqlite::Connection,
    id: i64,
    deleted_at: i64,
) -> Result<(), StoreError> {
    let updated = conn
        .execute(
            "UPDATE construction_log SET deleted = 1, \
             deleted_at = COALESCE(deleted_at, ?1), updated_at = ?1 WHERE id = ?2",
            params![deleted_at, id],
        )
        .map_err(|e| StoreError::Database(format!("failed to trash log: {e}")))?;

    if updated == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Bring a trashed log back into the active set.
///
/// # Errors
///
/// - [`StoreError::NotFound`] if `id` does not exist.
/// - [`StoreError::Database`] if the UPDATE fails.
pub fn restore_log(conn: &rusqlite::Connection, id: i64) -> Result<(), StoreError> {
    let updated = conn
        .execute(
            "UPDATE construction_log SET deleted = 0, deleted_at = NULL, updated_at = ?1 \
             WHERE id = ?2",
            params![now_millis(), id],
        )
        .map_err(|e| StoreError::Database(format!("failed to restore log: {e}")))?;

    if updated == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Hard-delete a log. Its images go with it.
///
/// # Errors
///
/// - [`StoreError::NotFound`] if `id` does not exist.
/// - [`StoreError::Database`] if the DELETE fails.
pub fn delete_forever(conn: &rusqlite::Connection, id: i64) -> Result<(), StoreError> {
    let deleted = conn
        .execute("DELETE FROM construction_log WHERE id = ?1", params![id])
        .map_err(|e| StoreError::Database(format!("failed to delete log: {e}")))?;

    if deleted == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Hard-delete every trashed log whose `deleted_at` is older than
/// `now_ms - retention_days`. Returns the number of logs removed.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the DELETE fails.
pub fn purge_expired(
    conn: &rusqlite::Connection,
    retention_days: u32,
    now_ms: i64,
) -> Result<usize, StoreError> {
    let expiry = now_ms.saturating_sub(i64::from(retention_days).saturating_mul(DAY_MS));

    let purged = conn
        .execute(
            "DELETE FROM construction_log WHERE deleted = 1 AND deleted_at < ?1",
            params![expiry],
        )
        .map_err(|e| StoreError::Database(format!("failed to purge trash: {e}")))?;

    if purged > 0 {
        info!(purged, retention_days, "expired trash purged");
    }
    Ok(purged)
}
