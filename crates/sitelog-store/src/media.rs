//! Media directory helpers: importing picked photos, listing, clearing, and
//! the orphan sweep.
//!
//! Images are referenced from the database by `file://` URI, but the media
//! directory is flat and files are matched by file name only. Two logs
//! pointing at different files with the same name are indistinguishable here
//! and in backups.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

use crate::clock::now_millis;
use crate::error::StoreError;

/// Extension used when the source has none.
const DEFAULT_EXTENSION: &str = "jpg";

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files deleted.
    pub removed: usize,
    /// Files that could not be deleted (logged and skipped).
    pub failed: usize,
}

/// `file://` URI for an absolute path.
#[must_use]
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// File name component of a URI or path string, ignoring any query/fragment.
#[must_use]
pub fn uri_file_name(uri: &str) -> Option<&str> {
    let trimmed = uri.split(['?', '#']).next().unwrap_or(uri);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

/// Regular files in the media directory, sorted by file name.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the directory cannot be read.
pub fn list_media_files(media_dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !media_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(media_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Copy a picked image into the media directory and return its URI.
///
/// The copy is named `IMG_<epoch-ms>_<0..9999>.<ext>`, keeping the source
/// extension (default `jpg`). A source already inside the media directory is
/// reused as-is.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the source cannot be read or the copy fails.
pub fn import_image(media_dir: &Path, source: &Path) -> Result<String, StoreError> {
    fs::create_dir_all(media_dir)?;

    if let (Some(parent), Some(name), Ok(media)) = (
        source.parent(),
        source.file_name(),
        fs::canonicalize(media_dir),
    ) {
        if source.is_file() && fs::canonicalize(parent).is_ok_and(|p| p == media) {
            return Ok(file_uri(&media.join(name)));
        }
    }

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EXTENSION)
        .to_ascii_lowercase();
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    let target = media_dir.join(format!("IMG_{}_{suffix}.{extension}", now_millis()));

    fs::copy(source, &target)?;
    debug!(target = %target.display(), "image imported");
    Ok(file_uri(&target))
}

/// Delete every file in the media directory. Returns the number removed.
///
/// # Errors
///
/// Returns [`StoreError::Io`] on the first file that cannot be removed.
pub fn clear_media(media_dir: &Path) -> Result<usize, StoreError> {
    let files = list_media_files(media_dir)?;
    for file in &files {
        fs::remove_file(file)?;
    }
    Ok(files.len())
}

/// Delete media files that no URI in `referenced` points at.
///
/// Best effort: a file that cannot be deleted is logged and skipped.
///
/// # Errors
///
/// Returns [`StoreError::Io`] only if the directory cannot be listed.
pub fn sweep_orphans(media_dir: &Path, referenced: &[String]) -> Result<SweepReport, StoreError> {
    let keep: HashSet<&str> = referenced
        .iter()
        .filter_map(|uri| uri_file_name(uri))
        .collect();

    let mut report = SweepReport::default();
    for file in list_media_files(media_dir)? {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if keep.contains(name) {
            continue;
        }
        match fs::remove_file(&file) {
            Ok(()) => report.removed = report.removed.saturating_add(1),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "could not remove orphaned image");
                report.failed = report.failed.saturating_add(1);
            }
        }
    }
    Ok(report)
}
