//! Cryptographic error types for `sitelog-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic and envelope operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Symmetric encryption failure (bad key length, cipher setup).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed: ciphertext tampered or wrong key.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// The decrypted plaintext does not hash to the digest recorded in the envelope.
    #[error("integrity check failed: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        /// Digest recorded in the envelope.
        expected: String,
        /// Digest of the decrypted plaintext.
        actual: String,
    },

    /// Envelope fields that carry key-dependent bytes (`iv`, `data`) cannot be
    /// decoded, which only happens when the file was altered.
    #[error("backup payload corrupted: {0}")]
    Corrupted(String),

    /// Envelope version is not one this build understands.
    #[error("unsupported backup version: {0}")]
    UnsupportedVersion(i64),

    /// Envelope is malformed (bad JSON, missing field).
    #[error("backup format error: {0}")]
    Format(String),

    /// CSPRNG failure while producing key material or nonces.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}

impl CryptoError {
    /// `true` for failures that mean the data was corrupted or tampered with.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Decryption | Self::IntegrityMismatch { .. } | Self::Corrupted(_)
        )
    }
}
