//! Key derivation and content digests.
//!
//! The backup key is not a password-derived key. It is a deterministic
//! function of the application identifier, so any installation of the same
//! application can read a backup produced by another one.

use data_encoding::HEXLOWER;
use ring::digest;

use crate::memory::SecretBytes;
use crate::symmetric::KEY_LEN_128;

/// Fixed label mixed into the backup key derivation.
pub const BACKUP_KEY_LABEL: &str = "construction-log-backup";

/// Derive the 128-bit backup key for an application identifier.
///
/// `key = SHA-256(app_id + ":" + BACKUP_KEY_LABEL)[0..16]`
#[must_use]
pub fn derive_backup_key(app_id: &str) -> SecretBytes<KEY_LEN_128> {
    let material = format!("{app_id}:{BACKUP_KEY_LABEL}");
    let hash = digest::digest(&digest::SHA256, material.as_bytes());

    let mut key = [0u8; KEY_LEN_128];
    key.copy_from_slice(&hash.as_ref()[..KEY_LEN_128]);
    SecretBytes::new(key)
}

/// SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_ref());
    out
}

/// Lowercase hex SHA-256 digest of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256(data))
}
