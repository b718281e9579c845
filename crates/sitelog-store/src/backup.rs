//! Encrypted backup export, preview, and the restore installer.
//!
//! Export: checkpoint → pack archive → seal envelope → write JSON to the sink.
//!
//! Import walks a fixed sequence of phases and logs each transition:
//!
//! ```text
//! Idle → Decoding → Unpacking → Validating → Replacing → Cleanup → Success
//!                                                                 ↘ Failed
//! ```
//!
//! Nothing on disk changes before `Replacing`. Replacement renames staged
//! files over the live ones: the database file and its sidecars first, then
//! the media directory in a single directory rename. A failure between those
//! renames leaves the live data half replaced; the caller must then ask the
//! user to import again. After success the process has to restart before the
//! store is reopened.

use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use sitelog_crypto_core::backup_format::{self, BackupPayload};
use sitelog_crypto_core::kdf::derive_backup_key;
use sitelog_crypto_core::CryptoError;
use tracing::{error, info, warn};

use crate::archive::{self, ArchiveMetadata, ArchiveSources, ExtractedArchive};
use crate::clock::now_millis;
use crate::error::StoreError;
use crate::layout::StorageLayout;
use crate::store::LogStore;

/// File name offered to the user when exporting.
#[must_use]
pub fn suggested_file_name(now_ms: i64) -> String {
    format!("construction-log-backup-{now_ms}.zip")
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Media files packed.
    pub image_count: usize,
    /// Plaintext archive size in bytes.
    pub archive_size: usize,
    /// Export time written into the archive metadata.
    pub export_time: i64,
}

/// Write an encrypted backup of the live database and media to `sink`.
///
/// The store stays open; its connection lock is held while the database
/// files are read.
///
/// # Errors
///
/// - [`StoreError::Database`] if the checkpoint fails.
/// - [`StoreError::Io`] if a file cannot be read or the sink fails.
/// - [`StoreError::Crypto`] if sealing fails.
pub fn export_backup<W: Write>(
    store: &LogStore,
    layout: &StorageLayout,
    app_id: &str,
    mut sink: W,
) -> Result<ExportSummary, StoreError> {
    let export_time = now_millis();
    let db_path = layout.db_path();
    let wal_path = layout.wal_path();
    let shm_path = layout.shm_path();
    let media_dir = layout.media_dir();

    let packed = store.with_quiesced_files(|| {
        archive::pack(
            &ArchiveSources {
                db_file: &db_path,
                wal_file: Some(&wal_path),
                shm_file: Some(&shm_path),
                media_dir: &media_dir,
            },
            export_time,
        )
    })?;

    let key = derive_backup_key(app_id);
    let payload = backup_format::encode(&packed.bytes, &key)?;
    sink.write_all(&payload.to_json()?)?;
    sink.flush()?;

    info!(
        images = packed.image_count,
        archive_bytes = packed.bytes.len(),
        "backup exported"
    );

    Ok(ExportSummary {
        image_count: packed.image_count,
        archive_size: packed.bytes.len(),
        export_time,
    })
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Contents of a backup file, read without touching live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPreview {
    pub has_wal: bool,
    pub has_shm: bool,
    pub image_count: usize,
    pub metadata: ArchiveMetadata,
}

fn open_envelope(bytes: &[u8], app_id: &str) -> Result<Vec<u8>, StoreError> {
    let payload = BackupPayload::from_json(bytes)?;
    let key = derive_backup_key(app_id);
    backup_format::decode(&payload, &key).map_err(|e| {
        match &e {
            CryptoError::Decryption => {
                warn!("backup rejected: authentication tag mismatch");
            }
            CryptoError::IntegrityMismatch { expected, actual } => {
                warn!(%expected, %actual, "backup rejected: plaintext sha256 mismatch");
            }
            CryptoError::Corrupted(reason) => {
                warn!(%reason, "backup rejected: undecodable envelope field");
            }
            _ => {}
        }
        StoreError::from(e)
    })
}

/// Decrypt a backup and list its archive.
///
/// # Errors
///
/// Format, version or integrity errors, as for [`import_backup`].
pub fn preview_backup(bytes: &[u8], app_id: &str) -> Result<BackupPreview, StoreError> {
    let plain = open_envelope(bytes, app_id)?;
    let listing = archive::inspect(&plain)?;
    Ok(BackupPreview {
        has_wal: listing.has_wal,
        has_shm: listing.has_shm,
        image_count: listing.images.len(),
        metadata: listing.metadata,
    })
}

// ---------------------------------------------------------------------------
// Restore installer
// ---------------------------------------------------------------------------

/// Restore phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Decoding,
    Unpacking,
    Validating,
    Replacing,
    Cleanup,
    Success,
    Failed,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Decoding => "decoding",
            Self::Unpacking => "unpacking",
            Self::Validating => "validating",
            Self::Replacing => "replacing",
            Self::Cleanup => "cleanup",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Always `true`: the process must restart before reopening the store.
    pub restart_required: bool,
    /// Media files installed.
    pub images_restored: usize,
    /// Metadata of the restored archive.
    pub metadata: ArchiveMetadata,
}

/// Phase tracker that logs every transition.
#[derive(Debug)]
struct RestoreRun {
    phase: RestorePhase,
}

impl RestoreRun {
    const fn new() -> Self {
        Self {
            phase: RestorePhase::Idle,
        }
    }

    fn enter(&mut self, next: RestorePhase) {
        info!(from = %self.phase, to = %next, "restore phase");
        self.phase = next;
    }

    fn fail(&mut self, err: &StoreError) {
        if self.phase == RestorePhase::Replacing {
            error!(error = %err, "restore failed while replacing files; live data may be partially replaced");
        } else {
            warn!(phase = %self.phase, error = %err, "restore failed; live data untouched");
        }
        self.enter(RestorePhase::Failed);
    }
}

/// Replace the live database and media with the contents of a backup.
///
/// Precondition: the live store has been closed. This is not checked here.
///
/// # Errors
///
/// - [`StoreError::Format`] for a malformed envelope or archive.
/// - [`StoreError::UnsupportedVersion`] for an envelope version other than 1.
/// - [`StoreError::Integrity`] for a tag or digest failure.
/// - [`StoreError::Io`] for filesystem errors, possibly mid-replacement.
pub fn import_backup<R: Read>(
    layout: &StorageLayout,
    app_id: &str,
    source: R,
) -> Result<RestoreOutcome, StoreError> {
    let mut run = RestoreRun::new();
    match run_restore(&mut run, layout, app_id, source) {
        Ok(outcome) => {
            run.enter(RestorePhase::Success);
            Ok(outcome)
        }
        Err(e) => {
            run.fail(&e);
            Err(e)
        }
    }
}

fn run_restore<R: Read>(
    run: &mut RestoreRun,
    layout: &StorageLayout,
    app_id: &str,
    mut source: R,
) -> Result<RestoreOutcome, StoreError> {
    run.enter(RestorePhase::Decoding);
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    let plain = open_envelope(&bytes, app_id)?;
    drop(bytes);

    run.enter(RestorePhase::Unpacking);
    let extracted = archive::unpack(&plain, &layout.cache_dir())?;
    drop(plain);

    run.enter(RestorePhase::Validating);
    validate_extracted(&extracted)?;

    run.enter(RestorePhase::Replacing);
    fs::create_dir_all(layout.data_dir())?;
    replace_database(&extracted, layout)?;
    replace_media(&extracted, layout)?;

    run.enter(RestorePhase::Cleanup);
    let outcome = RestoreOutcome {
        restart_required: true,
        images_restored: extracted.listing.images.len(),
        metadata: extracted.listing.metadata.clone(),
    };
    if let Err(e) = extracted.cleanup() {
        warn!(error = %e, "could not remove restore temp directory");
    }

    Ok(outcome)
}

fn validate_extracted(extracted: &ExtractedArchive) -> Result<(), StoreError> {
    if !extracted.db_file().is_file() {
        return Err(StoreError::Format(format!(
            "{} missing after extraction",
            archive::DB_ENTRY
        )));
    }
    for sidecar in [extracted.wal_file(), extracted.shm_file()].into_iter().flatten() {
        if !sidecar.is_file() {
            return Err(StoreError::Format(format!(
                "{} missing after extraction",
                sidecar.display()
            )));
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// Move the staged database and sidecars over the live ones.
///
/// Stale sidecars are removed first so the new main file is never paired
/// with the old WAL.
fn replace_database(extracted: &ExtractedArchive, layout: &StorageLayout) -> Result<(), StoreError> {
    remove_if_exists(&layout.wal_path())?;
    remove_if_exists(&layout.shm_path())?;

    move_file(&extracted.db_file(), &layout.db_path())?;
    if let Some(wal) = extracted.wal_file() {
        move_file(&wal, &layout.wal_path())?;
    }
    if let Some(shm) = extracted.shm_file() {
        move_file(&shm, &layout.shm_path())?;
    }
    Ok(())
}

/// Rename, falling back to copy + remove when source and target sit on
/// different filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), StoreError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    remove_if_exists(from)
}

/// Swap the media directory for the staged one with a directory rename.
fn replace_media(extracted: &ExtractedArchive, layout: &StorageLayout) -> Result<(), StoreError> {
    let staged = extracted.images_dir();
    fs::create_dir_all(&staged)?;

    let live = layout.media_dir();
    let retired = layout
        .data_dir()
        .join(format!(".{}.replaced-{}", crate::layout::MEDIA_DIR, now_millis()));

    let had_live = live.exists();
    if had_live {
        fs::rename(&live, &retired)?;
    }

    if let Err(e) = fs::rename(&staged, &live) {
        // Cross-device staging: fall back to a fresh directory and copies.
        warn!(error = %e, "media directory rename failed, copying instead");
        fs::create_dir_all(&live)?;
        for file in crate::media::list_media_files(&staged)? {
            if let Some(name) = file.file_name() {
                fs::copy(&file, live.join(name))?;
            }
        }
    }

    if had_live {
        if let Err(e) = fs::remove_dir_all(&retired) {
            warn!(dir = %retired.display(), error = %e, "could not remove replaced media directory");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names() {
        assert_eq!(RestorePhase::Replacing.to_string(), "replacing");
        assert_eq!(RestorePhase::Failed.to_string(), "failed");
    }

    #[test]
    fn suggested_name_uses_timestamp() {
        assert_eq!(
            suggested_file_name(1_717_200_000_000),
            "construction-log-backup-1717200000000.zip"
        );
    }

    #[test]
    fn run_tracks_phases() {
        let mut run = RestoreRun::new();
        run.enter(RestorePhase::Decoding);
        run.fail(&StoreError::Format("x".into()));
        assert_eq!(run.phase, RestorePhase::Failed);
    }

    #[test]
    fn import_of_garbage_fails_before_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = StorageLayout::new(dir.path());
        let err = import_backup(&layout, "app", &b"{}"[..]).expect_err("garbage");
        assert!(matches!(err, StoreError::Format(_)));
        assert!(!layout.db_path().exists());
        assert!(!layout.cache_dir().exists());
    }
}
