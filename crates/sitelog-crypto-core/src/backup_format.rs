//! Backup envelope: authenticated encryption + plaintext digest in JSON.
//!
//! This module provides:
//! - [`encode`]: seal archive bytes into a [`BackupPayload`]
//! - [`decode`]: verify and open a [`BackupPayload`]
//! - [`BackupPayload::to_json`] / [`BackupPayload::from_json`]: file form
//!
//! # File Layout
//!
//! ```text
//! {
//!   "version": 1,
//!   "algorithm": "AES/GCM/NoPadding",
//!   "sha256": "<64 lowercase hex chars>",
//!   "iv": "<base64, 12 raw bytes>",
//!   "data": "<base64 ciphertext || tag>"
//! }
//! ```
//!
//! - **sha256**: digest of the plaintext archive, checked after decryption
//! - **iv**: fresh random 96-bit nonce per export
//! - **data**: AES-128-GCM output with the 16-byte tag appended
//!
//! Field order is not significant and unknown fields are ignored, so a newer
//! writer adding fields stays readable as long as `version` is unchanged.

use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::kdf::sha256_hex;
use crate::memory::SecretBytes;
use crate::symmetric::{self, SealedData, KEY_LEN_128};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current envelope version. Any other value is rejected.
pub const FORMAT_VERSION: i64 = 1;

/// Algorithm label written into every envelope.
pub const ALGORITHM: &str = "AES/GCM/NoPadding";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// JSON envelope persisted to the user-chosen backup file.
#[must_use = "backup payload must be written to the destination"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPayload {
    /// Envelope version (currently 1).
    pub version: i64,
    /// Cipher label, informational only.
    pub algorithm: String,
    /// Lowercase hex SHA-256 of the plaintext archive.
    pub sha256: String,
    /// Base64 nonce.
    pub iv: String,
    /// Base64 `ciphertext || tag`.
    pub data: String,
}

impl BackupPayload {
    /// Serialize to compact JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Format` if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, CryptoError> {
        serde_json::to_vec(self)
            .map_err(|e| CryptoError::Format(format!("payload serialization failed: {e}")))
    }

    /// Parse an envelope from JSON bytes.
    ///
    /// The version is checked before the other fields, so a future envelope
    /// with a different shape reports `UnsupportedVersion` rather than a
    /// missing-field error.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Format` for invalid JSON or a missing/mistyped field.
    /// - `CryptoError::UnsupportedVersion` if `version != 1`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CryptoError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| CryptoError::Format(format!("backup file is not valid JSON: {e}")))?;

        let version = value
            .get("version")
            .ok_or_else(|| CryptoError::Format("missing field `version`".into()))?
            .as_i64()
            .ok_or_else(|| CryptoError::Format("field `version` must be an integer".into()))?;
        if version != FORMAT_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }

        serde_json::from_value(value)
            .map_err(|e| CryptoError::Format(format!("invalid backup payload: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Seal `plaintext` into a version-1 envelope.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` or `CryptoError::SecureMemory` if the
/// cipher or the CSPRNG fails.
pub fn encode(
    plaintext: &[u8],
    key: &SecretBytes<KEY_LEN_128>,
) -> Result<BackupPayload, CryptoError> {
    let digest = sha256_hex(plaintext);
    let sealed = symmetric::encrypt(plaintext, key.expose(), &[])?;

    Ok(BackupPayload {
        version: FORMAT_VERSION,
        algorithm: ALGORITHM.to_string(),
        sha256: digest,
        iv: BASE64.encode(&sealed.nonce),
        data: BASE64.encode(&sealed.ciphertext_with_tag()),
    })
}

/// Verify and open an envelope, returning the plaintext archive bytes.
///
/// # Errors
///
/// - `CryptoError::UnsupportedVersion` if `version != 1`.
/// - `CryptoError::Corrupted` if `iv` or `data` cannot be decoded.
/// - `CryptoError::Decryption` if the GCM tag does not verify.
/// - `CryptoError::IntegrityMismatch` if the plaintext digest differs.
pub fn decode(
    payload: &BackupPayload,
    key: &SecretBytes<KEY_LEN_128>,
) -> Result<Vec<u8>, CryptoError> {
    if payload.version != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(payload.version));
    }

    let nonce = BASE64
        .decode(payload.iv.as_bytes())
        .map_err(|e| CryptoError::Corrupted(format!("iv is not valid base64: {e}")))?;
    let data = BASE64
        .decode(payload.data.as_bytes())
        .map_err(|e| CryptoError::Corrupted(format!("data is not valid base64: {e}")))?;

    let sealed = SealedData::from_parts(&nonce, &data)?;
    let mut plaintext = symmetric::decrypt(&sealed, key.expose(), &[])?;

    let actual = sha256_hex(&plaintext);
    if !actual.eq_ignore_ascii_case(payload.sha256.trim()) {
        return Err(CryptoError::IntegrityMismatch {
            expected: payload.sha256.clone(),
            actual,
        });
    }

    Ok(std::mem::take(&mut *plaintext))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_backup_key;

    fn key() -> SecretBytes<KEY_LEN_128> {
        derive_backup_key("com.example.constructionlog")
    }

    #[test]
    fn encode_fills_every_field() {
        let payload = encode(b"archive", &key()).expect("encode");
        assert_eq!(payload.version, 1);
        assert_eq!(payload.algorithm, "AES/GCM/NoPadding");
        assert_eq!(payload.sha256.len(), 64);
        assert_eq!(BASE64.decode(payload.iv.as_bytes()).expect("iv").len(), 12);
        assert_eq!(
            BASE64.decode(payload.data.as_bytes()).expect("data").len(),
            b"archive".len() + 16
        );
    }

    #[test]
    fn decode_roundtrip() {
        let payload = encode(b"zip bytes", &key()).expect("encode");
        assert_eq!(decode(&payload, &key()).expect("decode"), b"zip bytes");
    }

    #[test]
    fn json_roundtrip() {
        let payload = encode(b"zip bytes", &key()).expect("encode");
        let json = payload.to_json().expect("to_json");
        let parsed = BackupPayload::from_json(&json).expect("from_json");
        assert_eq!(parsed, payload);
    }

    #[test]
    fn uppercase_digest_is_accepted() {
        let mut payload = encode(b"zip bytes", &key()).expect("encode");
        payload.sha256 = payload.sha256.to_uppercase();
        assert!(decode(&payload, &key()).is_ok());
    }

    #[test]
    fn version_two_is_rejected() {
        let mut payload = encode(b"zip bytes", &key()).expect("encode");
        payload.version = 2;
        assert!(matches!(
            decode(&payload, &key()),
            Err(CryptoError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn from_json_checks_version_first() {
        let json = br#"{"version": 2}"#;
        assert!(matches!(
            BackupPayload::from_json(json),
            Err(CryptoError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn from_json_rejects_missing_field() {
        let json = br#"{"version": 1, "algorithm": "AES/GCM/NoPadding", "sha256": "00", "iv": "AAAA"}"#;
        assert!(matches!(
            BackupPayload::from_json(json),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn from_json_rejects_missing_version() {
        let json = br#"{"algorithm": "x", "sha256": "00", "iv": "AAAA", "data": "AAAA"}"#;
        assert!(matches!(
            BackupPayload::from_json(json),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn from_json_tolerates_reordering_and_unknown_fields() {
        let payload = encode(b"zip bytes", &key()).expect("encode");
        let json = format!(
            r#"{{"data":"{}","comment":"from the future","iv":"{}","sha256":"{}","algorithm":"{}","version":1}}"#,
            payload.data, payload.iv, payload.sha256, payload.algorithm
        );
        let parsed = BackupPayload::from_json(json.as_bytes()).expect("from_json");
        assert_eq!(decode(&parsed, &key()).expect("decode"), b"zip bytes");
    }

    #[test]
    fn wrong_digest_is_integrity_mismatch() {
        let mut payload = encode(b"zip bytes", &key()).expect("encode");
        payload.sha256 = sha256_hex(b"something else");
        let err = decode(&payload, &key()).expect_err("digest mismatch");
        assert!(matches!(err, CryptoError::IntegrityMismatch { .. }));
        assert!(err.is_integrity_failure());
    }

    #[test]
    fn wrong_key_is_decryption_failure() {
        let payload = encode(b"zip bytes", &key()).expect("encode");
        let other = derive_backup_key("org.other.app");
        assert!(matches!(
            decode(&payload, &other),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn garbage_base64_is_corrupted() {
        let mut payload = encode(b"zip bytes", &key()).expect("encode");
        payload.iv = "!!!not base64!!!".into();
        let err = decode(&payload, &key()).expect_err("bad iv");
        assert!(err.is_integrity_failure());
    }
}
