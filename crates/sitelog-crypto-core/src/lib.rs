//! `sitelog-crypto-core`: Pure cryptographic primitives for sitelog backups.
//!
//! Zero I/O, zero async. The store crate owns files and databases; this crate
//! only turns bytes into sealed bytes and back.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod symmetric;

pub mod backup_format;

pub use backup_format::{decode, encode, BackupPayload, ALGORITHM, FORMAT_VERSION};
pub use error::CryptoError;
pub use kdf::{derive_backup_key, sha256, sha256_hex, BACKUP_KEY_LABEL};
pub use memory::SecretBytes;
pub use symmetric::{decrypt, encrypt, SealedData, KEY_LEN_128, KEY_LEN_256, NONCE_LEN, TAG_LEN};
