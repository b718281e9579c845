//! On-disk layout of an installation and the store configuration.
//!
//! Every path the store, the backup exporter and the restore installer touch
//! is derived from a single data directory.

use std::path::{Path, PathBuf};

use crate::db::DEFAULT_DB_PASSPHRASE;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "construction_logs_secure.db";

/// Media directory name inside the data directory.
pub const MEDIA_DIR: &str = "Pictures";

/// Settings file name.
pub const SETTINGS_FILE: &str = "settings.json";

/// Sealed provider secret file name.
pub const SECRET_FILE: &str = "provider_secret.json";

/// Scratch directory for backup staging.
pub const CACHE_DIR: &str = "cache";

/// Application identifier mixed into the backup key.
pub const DEFAULT_APP_ID: &str = "com.example.constructionlog";

/// Resolves every on-disk location from one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    data_dir: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at `data_dir`. Nothing is created until
    /// [`ensure_dirs`](Self::ensure_dirs) is called.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Encrypted database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    /// Write-ahead log sidecar of the database.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(format!("{DB_FILE}-wal"))
    }

    /// Shared-memory sidecar of the database.
    #[must_use]
    pub fn shm_path(&self) -> PathBuf {
        self.data_dir.join(format!("{DB_FILE}-shm"))
    }

    /// Directory holding log photos.
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join(MEDIA_DIR)
    }

    /// Scratch directory for temporary backup files.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(CACHE_DIR)
    }

    /// Sealed provider secret file.
    #[must_use]
    pub fn secret_path(&self) -> PathBuf {
        self.data_dir.join(SECRET_FILE)
    }

    /// Create the data, media and cache directories if missing.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if a directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.media_dir())?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}

/// Everything needed to open a store and run backups against it.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Where the files live.
    pub layout: StorageLayout,
    /// Application identifier for backup key derivation.
    pub app_id: String,
    /// `SQLCipher` passphrase.
    pub db_passphrase: String,
}

impl StoreConfig {
    /// Configuration with the default app id and passphrase.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: StorageLayout::new(data_dir),
            app_id: DEFAULT_APP_ID.to_string(),
            db_passphrase: DEFAULT_DB_PASSPHRASE.to_string(),
        }
    }

    /// Override the application identifier.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_the_data_dir() {
        let layout = StorageLayout::new("/data/app");
        assert_eq!(
            layout.db_path(),
            Path::new("/data/app/construction_logs_secure.db")
        );
        assert_eq!(
            layout.wal_path(),
            Path::new("/data/app/construction_logs_secure.db-wal")
        );
        assert_eq!(
            layout.shm_path(),
            Path::new("/data/app/construction_logs_secure.db-shm")
        );
        assert_eq!(layout.media_dir(), Path::new("/data/app/Pictures"));
    }

    #[test]
    fn default_config() {
        let config = StoreConfig::new("/tmp/x");
        assert_eq!(config.app_id, "com.example.constructionlog");
        assert_eq!(config.db_passphrase, "construction_log_secure_db_v1");

        let flavored = config.with_app_id("com.example.constructionlog.debug");
        assert_eq!(flavored.app_id, "com.example.constructionlog.debug");
        assert_eq!(flavored.layout.db_path(), Path::new("/tmp/x/construction_logs_secure.db"));
    }

    #[test]
    fn ensure_dirs_creates_media_and_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = StorageLayout::new(dir.path().join("nested"));
        layout.ensure_dirs().expect("ensure_dirs");
        assert!(layout.media_dir().is_dir());
        assert!(layout.cache_dir().is_dir());
    }
}
