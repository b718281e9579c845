//! Backup export / preview / restore commands.
//!
//! Export runs against the open store. Restore checks the file first while
//! the store is still open, then takes the store out of the state, closes it
//! and runs the installer. After a successful restore the state stays closed
//! and the UI must restart the process.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sitelog_store::{backup, clock::now_millis, StoreError};
use tracing::{info, warn};

use super::{with_store, CommandError};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBackupResponse {
    pub image_count: usize,
    pub archive_size: usize,
    pub export_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPreviewDto {
    pub export_time: i64,
    pub image_count: usize,
    pub has_wal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub restart_required: bool,
    pub images_restored: usize,
    pub export_time: i64,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// File name to offer in the save dialog.
#[must_use]
pub fn suggested_backup_file_name() -> String {
    backup::suggested_file_name(now_millis())
}

/// Write an encrypted backup to `save_path`. A partial file is removed on
/// failure.
///
/// # Errors
///
/// `IO_ERROR` if the destination cannot be written.
pub async fn export_backup(
    state: &AppState,
    save_path: PathBuf,
) -> Result<ExportBackupResponse, CommandError> {
    let layout = state.config().store.layout.clone();
    let app_id = state.config().store.app_id.clone();

    let summary = with_store(state, move |store| {
        let file = File::create(&save_path)?;
        let result = backup::export_backup(store, &layout, &app_id, BufWriter::new(file));
        if result.is_err() {
            if let Err(e) = fs::remove_file(&save_path) {
                warn!(path = %save_path.display(), error = %e, "could not remove partial backup");
            }
        }
        result
    })
    .await?;

    Ok(ExportBackupResponse {
        image_count: summary.image_count,
        archive_size: summary.archive_size,
        export_time: summary.export_time,
    })
}

async fn read_and_check(
    state: &AppState,
    source: PathBuf,
) -> Result<(Vec<u8>, backup::BackupPreview), CommandError> {
    let app_id = state.config().store.app_id.clone();
    tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
        let bytes = fs::read(&source)?;
        let preview = backup::preview_backup(&bytes, &app_id)?;
        Ok((bytes, preview))
    })
    .await
    .map_err(|e| CommandError::internal(format!("Backup task failed: {e}")))?
    .map_err(CommandError::from)
}

/// Decrypt and list a backup without touching live data.
///
/// # Errors
///
/// `FORMAT`, `VERSION` or `INTEGRITY` for a bad file.
pub async fn preview_backup(
    state: &AppState,
    source: PathBuf,
) -> Result<BackupPreviewDto, CommandError> {
    let (_, preview) = read_and_check(state, source).await?;
    Ok(BackupPreviewDto {
        export_time: preview.metadata.export_time,
        image_count: preview.image_count,
        has_wal: preview.has_wal,
    })
}

/// Replace all data with the contents of a backup.
///
/// # Errors
///
/// - `FORMAT`, `VERSION` or `INTEGRITY` for a bad file; the store stays open.
/// - `PRECONDITION` if another command still holds the store.
/// - `IO_ERROR` if replacement fails; the store is closed either way.
pub async fn import_backup(
    state: &AppState,
    source: PathBuf,
) -> Result<RestoreResponse, CommandError> {
    let (bytes, _) = read_and_check(state, source).await?;

    let shared = state.take_store()?;
    let store = match Arc::try_unwrap(shared) {
        Ok(store) => store,
        Err(shared) => {
            state.put_store(shared)?;
            return Err(CommandError::new(
                "PRECONDITION",
                "Another operation is still using the data. Try again.",
            ));
        }
    };

    let layout = state.config().store.layout.clone();
    let app_id = state.config().store.app_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        store.close()?;
        info!("store closed for restore");
        backup::import_backup(&layout, &app_id, bytes.as_slice())
    })
    .await
    .map_err(|e| CommandError::internal(format!("Restore task failed: {e}")))??;

    Ok(RestoreResponse {
        restart_required: outcome.restart_required,
        images_restored: outcome.images_restored,
        export_time: outcome.metadata.export_time,
    })
}
