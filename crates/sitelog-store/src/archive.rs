//! Archive container: the zip bundle of database, sidecars, media and
//! metadata that the backup envelope encrypts.
//!
//! # Entry layout
//!
//! ```text
//! database.sqlite          main database file (required)
//! database.sqlite-wal      write-ahead log (if present on disk)
//! database.sqlite-shm      shared-memory index (if present on disk)
//! images/<file name>       every regular file of the media directory
//! metadata.json            {"version":1,"exportTime":<ms>,"app":"construction-log"}
//! ```
//!
//! Entries are written in exactly that order; images are sorted by name.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::StoreError;
use crate::media::list_media_files;

/// Main database entry.
pub const DB_ENTRY: &str = "database.sqlite";
/// WAL sidecar entry.
pub const WAL_ENTRY: &str = "database.sqlite-wal";
/// SHM sidecar entry.
pub const SHM_ENTRY: &str = "database.sqlite-shm";
/// Metadata entry.
pub const METADATA_ENTRY: &str = "metadata.json";
/// Directory prefix of media entries.
pub const IMAGES_PREFIX: &str = "images/";

/// Archive metadata version.
pub const METADATA_VERSION: i64 = 1;
/// Application tag written into metadata.
pub const APP_TAG: &str = "construction-log";

/// `metadata.json` contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    pub version: i64,
    /// Export time, epoch milliseconds.
    pub export_time: i64,
    pub app: String,
}

impl ArchiveMetadata {
    /// Metadata for an export made at `export_time`.
    #[must_use]
    pub fn new(export_time: i64) -> Self {
        Self {
            version: METADATA_VERSION,
            export_time,
            app: APP_TAG.to_string(),
        }
    }
}

/// Files to pack.
#[derive(Debug, Clone)]
pub struct ArchiveSources<'a> {
    pub db_file: &'a Path,
    pub wal_file: Option<&'a Path>,
    pub shm_file: Option<&'a Path>,
    pub media_dir: &'a Path,
}

/// Summary of what [`pack`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
    pub bytes: Vec<u8>,
    pub image_count: usize,
    pub metadata: ArchiveMetadata,
}

// ---------------------------------------------------------------------------
// Pack
// ---------------------------------------------------------------------------

fn add_file<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    archive_name: &str,
    options: SimpleFileOptions,
) -> Result<(), StoreError> {
    let mut file = File::open(path)?;
    zip.start_file(archive_name, options)?;
    io::copy(&mut file, zip)?;
    debug!(entry = archive_name, "archive entry written");
    Ok(())
}

/// Build the archive. Sidecars listed in `sources` but missing on disk are
/// skipped; a missing main database file is an error.
///
/// # Errors
///
/// - [`StoreError::NotFound`] if the database file does not exist.
/// - [`StoreError::Io`] if a file cannot be read.
/// - [`StoreError::Format`] if the zip writer fails.
pub fn pack(sources: &ArchiveSources<'_>, export_time: i64) -> Result<PackedArchive, StoreError> {
    if !sources.db_file.is_file() {
        return Err(StoreError::NotFound(format!(
            "database file {} does not exist",
            sources.db_file.display()
        )));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    add_file(&mut zip, sources.db_file, DB_ENTRY, options)?;
    if let Some(wal) = sources.wal_file.filter(|p| p.is_file()) {
        add_file(&mut zip, wal, WAL_ENTRY, options)?;
    }
    if let Some(shm) = sources.shm_file.filter(|p| p.is_file()) {
        add_file(&mut zip, shm, SHM_ENTRY, options)?;
    }

    let images = list_media_files(sources.media_dir)?;
    for image in &images {
        let Some(name) = image.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        add_file(&mut zip, image, &format!("{IMAGES_PREFIX}{name}"), options)?;
    }

    let metadata = ArchiveMetadata::new(export_time);
    let metadata_json = serde_json::to_vec(&metadata)
        .map_err(|e| StoreError::Format(format!("metadata serialization failed: {e}")))?;
    zip.start_file(METADATA_ENTRY, options)?;
    zip.write_all(&metadata_json)?;

    let bytes = zip.finish()?.into_inner();
    Ok(PackedArchive {
        bytes,
        image_count: images.len(),
        metadata,
    })
}

// ---------------------------------------------------------------------------
// Inspect / unpack
// ---------------------------------------------------------------------------

/// What an archive contains, without extracting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveListing {
    pub has_wal: bool,
    pub has_shm: bool,
    /// Media file names in archive order.
    pub images: Vec<String>,
    pub metadata: ArchiveMetadata,
}

/// Where an archive entry goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
    Database,
    Wal,
    Shm,
    Metadata,
    Image(String),
    Directory,
    Unknown,
}

/// Classify an entry, rejecting names that escape the extraction root.
fn classify(name: &str, is_dir: bool, enclosed: Option<PathBuf>) -> Result<EntryKind, StoreError> {
    let Some(path) = enclosed else {
        return Err(StoreError::Format(format!("unsafe archive entry name: {name}")));
    };
    if is_dir {
        return Ok(EntryKind::Directory);
    }

    match name {
        DB_ENTRY => return Ok(EntryKind::Database),
        WAL_ENTRY => return Ok(EntryKind::Wal),
        SHM_ENTRY => return Ok(EntryKind::Shm),
        METADATA_ENTRY => return Ok(EntryKind::Metadata),
        _ => {}
    }

    if let Some(rest) = name.strip_prefix(IMAGES_PREFIX) {
        let flat = Path::new(rest).components().count() == 1
            && matches!(Path::new(rest).components().next(), Some(Component::Normal(_)));
        if !flat {
            return Err(StoreError::Format(format!(
                "nested media entry not supported: {}",
                path.display()
            )));
        }
        return Ok(EntryKind::Image(rest.to_string()));
    }

    Ok(EntryKind::Unknown)
}

fn parse_metadata(bytes: &[u8]) -> Result<ArchiveMetadata, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Format(format!("invalid metadata.json: {e}")))
}

fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, StoreError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| StoreError::Format(format!("not a readable archive: {e}")))
}

/// List an archive's contents and validate its required entries.
///
/// # Errors
///
/// [`StoreError::Format`] if the archive is unreadable, has an unsafe entry
/// name, or lacks `metadata.json` or `database.sqlite`.
pub fn inspect(bytes: &[u8]) -> Result<ArchiveListing, StoreError> {
    let mut archive = open_archive(bytes)?;

    let mut has_db = false;
    let mut has_wal = false;
    let mut has_shm = false;
    let mut images = Vec::new();
    let mut metadata = None;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        match classify(&name, file.is_dir(), file.enclosed_name())? {
            EntryKind::Database => has_db = true,
            EntryKind::Wal => has_wal = true,
            EntryKind::Shm => has_shm = true,
            EntryKind::Image(image) => images.push(image),
            EntryKind::Metadata => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;
                metadata = Some(parse_metadata(&buf)?);
            }
            EntryKind::Directory | EntryKind::Unknown => {}
        }
    }

    let metadata = metadata
        .ok_or_else(|| StoreError::Format(format!("{METADATA_ENTRY} is missing")))?;
    if !has_db {
        return Err(StoreError::Format(format!("{DB_ENTRY} is missing")));
    }

    Ok(ArchiveListing {
        has_wal,
        has_shm,
        images,
        metadata,
    })
}

/// An archive extracted into a private temporary directory.
///
/// The directory is removed when this value is dropped, on every exit path.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    pub listing: ArchiveListing,
}

impl ExtractedArchive {
    /// Extraction root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Extracted `database.sqlite`.
    #[must_use]
    pub fn db_file(&self) -> PathBuf {
        self.root().join(DB_ENTRY)
    }

    /// Extracted WAL sidecar, if the archive had one.
    #[must_use]
    pub fn wal_file(&self) -> Option<PathBuf> {
        self.listing.has_wal.then(|| self.root().join(WAL_ENTRY))
    }

    /// Extracted SHM sidecar, if the archive had one.
    #[must_use]
    pub fn shm_file(&self) -> Option<PathBuf> {
        self.listing.has_shm.then(|| self.root().join(SHM_ENTRY))
    }

    /// Extracted media directory (may not exist if there were no images).
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.root().join(IMAGES_PREFIX.trim_end_matches('/'))
    }

    /// Remove the temporary directory now, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory cannot be removed.
    pub fn cleanup(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Extract an archive into a fresh temporary directory under `temp_root`.
///
/// Validation runs first, so a malformed archive never touches disk.
///
/// # Errors
///
/// - [`StoreError::Format`] as for [`inspect`].
/// - [`StoreError::Io`] if the temp directory or a file cannot be written.
pub fn unpack(bytes: &[u8], temp_root: &Path) -> Result<ExtractedArchive, StoreError> {
    let listing = inspect(bytes)?;

    fs::create_dir_all(temp_root)?;
    let dir = tempfile::Builder::new()
        .prefix("restore-")
        .tempdir_in(temp_root)?;
    let images_dir = dir.path().join(IMAGES_PREFIX.trim_end_matches('/'));

    let mut archive = open_archive(bytes)?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        let target = match classify(&name, file.is_dir(), file.enclosed_name())? {
            EntryKind::Database | EntryKind::Wal | EntryKind::Shm | EntryKind::Metadata => {
                dir.path().join(&name)
            }
            EntryKind::Image(image) => {
                fs::create_dir_all(&images_dir)?;
                images_dir.join(image)
            }
            EntryKind::Directory | EntryKind::Unknown => continue,
        };

        let mut out = File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        debug!(entry = %name, "archive entry extracted");
    }

    Ok(ExtractedArchive { dir, listing })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_entries() {
        let enclosed = |n: &str| Some(PathBuf::from(n));
        assert_eq!(
            classify(DB_ENTRY, false, enclosed(DB_ENTRY)).expect("db"),
            EntryKind::Database
        );
        assert_eq!(
            classify("images/a.jpg", false, enclosed("images/a.jpg")).expect("image"),
            EntryKind::Image("a.jpg".into())
        );
        assert_eq!(
            classify("notes.txt", false, enclosed("notes.txt")).expect("unknown"),
            EntryKind::Unknown
        );
    }

    #[test]
    fn classify_rejects_escaping_names() {
        assert!(matches!(
            classify("../evil", false, None),
            Err(StoreError::Format(_))
        ));
    }

    #[test]
    fn classify_rejects_nested_images() {
        assert!(matches!(
            classify("images/a/b.jpg", false, Some(PathBuf::from("images/a/b.jpg"))),
            Err(StoreError::Format(_))
        ));
    }

    #[test]
    fn metadata_field_names() {
        let json = serde_json::to_value(ArchiveMetadata::new(42)).expect("json");
        assert_eq!(json["version"], 1);
        assert_eq!(json["exportTime"], 42);
        assert_eq!(json["app"], "construction-log");
    }

    #[test]
    fn garbage_is_a_format_error() {
        assert!(matches!(inspect(b"not a zip"), Err(StoreError::Format(_))));
    }
}
