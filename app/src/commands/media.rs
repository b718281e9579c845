//! Photo import, orphan cleanup and the full data wipe.

use std::path::PathBuf;

use serde::Serialize;
use sitelog_store::media;

use super::{with_store, CommandError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub removed: usize,
    pub failed: usize,
}

/// Copy a picked image into the media directory. Returns its `file://` URI.
///
/// # Errors
///
/// `IO_ERROR` if the source cannot be read or copied.
pub async fn import_image(state: &AppState, source: PathBuf) -> Result<String, CommandError> {
    let media_dir = state.config().store.layout.media_dir();
    with_store(state, move |_| media::import_image(&media_dir, &source)).await
}

/// Delete media files no log references.
///
/// # Errors
///
/// `IO_ERROR` if the media directory cannot be listed.
pub async fn cleanup_orphaned_images(state: &AppState) -> Result<CleanupResponse, CommandError> {
    let media_dir = state.config().store.layout.media_dir();
    let report = with_store(state, move |store| store.cleanup_orphaned_images(&media_dir)).await?;
    Ok(CleanupResponse {
        removed: report.removed,
        failed: report.failed,
    })
}

/// Delete every project, log and photo. Returns the number of photos removed.
///
/// # Errors
///
/// A storage error, or `IO_ERROR` if a photo cannot be removed.
pub async fn clear_all_data(state: &AppState) -> Result<usize, CommandError> {
    let media_dir = state.config().store.layout.media_dir();
    let removed = with_store(state, move |store| {
        store.clear_all_data()?;
        media::clear_media(&media_dir)
    })
    .await?;
    state.session()?.resolve(&[]);
    Ok(removed)
}
