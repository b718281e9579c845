//! AES-GCM authenticated encryption.
//!
//! This module provides:
//! - [`encrypt`]: encrypt plaintext with a random nonce, returning [`SealedData`]
//! - [`decrypt`]: decrypt and authenticate [`SealedData`]
//! - [`SealedData`]: nonce + ciphertext + tag container
//!
//! The cipher width follows the key: a 16-byte key selects AES-128-GCM
//! (backup envelopes), a 32-byte key selects AES-256-GCM (provider secrets).

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-128 key length in bytes.
pub const KEY_LEN_128: usize = 16;

/// AES-256 key length in bytes.
pub const KEY_LEN_256: usize = 32;

/// Minimum valid serialized length: nonce + empty ciphertext + tag.
const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Authenticated ciphertext container: nonce + ciphertext + tag.
///
/// Two wire layouts are supported:
/// - [`to_bytes`](Self::to_bytes): `nonce || ciphertext || tag`
/// - [`ciphertext_with_tag`](Self::ciphertext_with_tag): `ciphertext || tag`,
///   with the nonce carried separately (the backup envelope layout)
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedData {
    /// 96-bit random nonce, unique per encryption.
    pub nonce: [u8; NONCE_LEN],
    /// Encrypted data (same length as original plaintext).
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Serialize to `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = NONCE_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Deserialize from `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decryption` if the input is shorter than
    /// 28 bytes; such input can never authenticate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SEALED_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        Self::from_parts(nonce, rest)
    }

    /// Return `ciphertext || tag`, the layout JCE-style `AES/GCM/NoPadding`
    /// ciphers produce.
    #[must_use]
    pub fn ciphertext_with_tag(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len().saturating_add(TAG_LEN));
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Assemble from a separate nonce and a `ciphertext || tag` buffer.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Corrupted` if the nonce is not 12 bytes.
    /// - `CryptoError::Decryption` if the buffer is shorter than the tag.
    pub fn from_parts(nonce: &[u8], ciphertext_with_tag: &[u8]) -> Result<Self, CryptoError> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            CryptoError::Corrupted(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            ))
        })?;

        let ct_len = ciphertext_with_tag
            .len()
            .checked_sub(TAG_LEN)
            .ok_or(CryptoError::Decryption)?;
        let (ciphertext, tag) = ciphertext_with_tag.split_at(ct_len);

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag);

        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
            tag: tag_bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// Core encryption
// ---------------------------------------------------------------------------

fn algorithm_for(key: &[u8]) -> Result<&'static aead::Algorithm, CryptoError> {
    match key.len() {
        KEY_LEN_128 => Ok(&aead::AES_128_GCM),
        KEY_LEN_256 => Ok(&aead::AES_256_GCM),
        other => Err(CryptoError::Encryption(format!(
            "invalid key length: {other} bytes (expected {KEY_LEN_128} or {KEY_LEN_256})"
        ))),
    }
}

fn less_safe_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    let algorithm = algorithm_for(key)?;
    let unbound = aead::UnboundKey::new(algorithm, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt plaintext using AES-GCM with a random 96-bit nonce.
///
/// # Arguments
///
/// - `plaintext`: data to encrypt (may be empty)
/// - `key`: 16 bytes (AES-128) or 32 bytes (AES-256)
/// - `aad`: additional authenticated data (may be empty)
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key length is unsupported or
/// the cipher fails, `CryptoError::SecureMemory` if the CSPRNG fails.
pub fn encrypt(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<SealedData, CryptoError> {
    let sealing_key = less_safe_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = sealing_key.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
    else {
        in_out.zeroize();
        return Err(CryptoError::Encryption("AES-GCM encryption failed".into()));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Decrypt AES-GCM authenticated ciphertext.
///
/// The plaintext is returned in a [`Zeroizing`] buffer that is wiped on drop.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key length is unsupported.
/// Returns `CryptoError::Decryption` if authentication fails (tampered data,
/// wrong key, or wrong AAD).
pub fn decrypt(
    sealed: &SealedData,
    key: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let opening_key = less_safe_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(sealed.nonce);

    let mut ct_tag = Zeroizing::new(sealed.ciphertext_with_tag());
    let plaintext_len = opening_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut ct_tag)
        .map_err(|_| CryptoError::Decryption)?
        .len();

    ct_tag.truncate(plaintext_len);
    Ok(ct_tag)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
