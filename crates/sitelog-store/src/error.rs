//! Store error types for `sitelog-store`.

use sitelog_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by store, backup and restore operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Blank or otherwise invalid user input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Uniqueness violation, e.g. a duplicate project name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation blocked by a business rule.
    #[error("not allowed: {0}")]
    Precondition(String),

    /// Malformed backup file or archive.
    #[error("invalid backup format: {0}")]
    Format(String),

    /// Authenticated decryption or plaintext digest check failed.
    #[error("backup is corrupted or has been tampered with: {0}")]
    Integrity(String),

    /// Backup envelope version is not supported.
    #[error("unsupported backup version: {0}")]
    UnsupportedVersion(i64),

    /// Cryptographic failure unrelated to backup integrity (CSPRNG, key setup).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// `SQLCipher` database error.
    #[error("database error: {0}")]
    Database(String),

    /// The database could not be decrypted with the configured passphrase.
    #[error("database key rejected")]
    InvalidKey,

    /// Migration error during schema upgrade.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// `true` when the backup was altered or sealed with another key.
    #[must_use]
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    /// `true` for errors caused by user input or user-supplied files,
    /// as opposed to environment failures.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Conflict(_)
                | Self::NotFound(_)
                | Self::Precondition(_)
                | Self::Format(_)
                | Self::Integrity(_)
                | Self::UnsupportedVersion(_)
        )
    }

    /// One human-readable sentence for the UI.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::NotFound(msg)
            | Self::Precondition(msg) => msg.clone(),
            Self::Format(_) => "The selected file is not a valid backup.".into(),
            Self::Integrity(_) => "The backup is corrupted or has been tampered with.".into(),
            Self::UnsupportedVersion(v) => {
                format!("Backup version {v} is not supported by this version of the app.")
            }
            Self::Io(e) => format!("File operation failed: {e}"),
            Self::Crypto(_)
            | Self::Database(_)
            | Self::InvalidKey
            | Self::Migration(_) => "An internal storage error occurred.".into(),
        }
    }
}

impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption
            | CryptoError::IntegrityMismatch { .. }
            | CryptoError::Corrupted(_) => Self::Integrity(err.to_string()),
            CryptoError::UnsupportedVersion(v) => Self::UnsupportedVersion(v),
            CryptoError::Format(msg) => Self::Format(msg),
            CryptoError::Encryption(_) | CryptoError::SecureMemory(_) => Self::Crypto(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // SQLITE_NOTADB (code 26) signals an incorrect encryption key.
        if let rusqlite::Error::SqliteFailure(ref ffi_err, _) = err {
            if ffi_err.code == rusqlite::ffi::ErrorCode::NotADatabase {
                return Self::InvalidKey;
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<zip::result::ZipError> for StoreError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::Format(format!("archive error: {other}")),
        }
    }
}
