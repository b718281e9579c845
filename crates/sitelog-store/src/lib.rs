//! `sitelog-store`: Project/log storage and encrypted backup for sitelog.
//!
//! Manages the `SQLCipher` log database, the trash lifecycle, the media
//! directory, live query observation, and backup export/restore.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod clock;
pub mod db;
pub mod error;
pub mod layout;

pub mod logs;
pub mod projects;
pub mod trash;

pub mod media;
pub mod observe;
pub mod store;

pub mod archive;
pub mod backup;

pub mod preferences;
pub mod secrets;

pub use archive::{ArchiveListing, ArchiveMetadata, ExtractedArchive};
pub use backup::{
    export_backup, import_backup, preview_backup, suggested_file_name, BackupPreview,
    ExportSummary, RestoreOutcome, RestorePhase,
};
pub use db::{LogDb, DEFAULT_DB_PASSPHRASE};
pub use error::StoreError;
pub use layout::{StorageLayout, StoreConfig, DEFAULT_APP_ID};
pub use logs::{ConstructionLog, LogDraft, LogImage, LogWithImages};
pub use media::{import_image, SweepReport};
pub use observe::QueryKey;
pub use preferences::{should_reauth, Settings};
pub use projects::Project;
pub use secrets::{SealedFileKeyStore, SecretKeyStore};
pub use store::LogStore;
pub use trash::DEFAULT_RETENTION_DAYS;
