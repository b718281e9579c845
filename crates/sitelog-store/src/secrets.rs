//! Secret storage for provider API keys.
//!
//! [`SecretKeyStore`] is the seam the app talks to. [`SealedFileKeyStore`]
//! seals each value with AES-256-GCM under a device key supplied by the
//! platform layer and keeps `base64(iv):base64(ciphertext||tag)` strings in a
//! small JSON file, one entry per slot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use data_encoding::BASE64;
use sitelog_crypto_core::memory::SecretBytes;
use sitelog_crypto_core::symmetric::{self, SealedData, KEY_LEN_256};
use tracing::warn;
use zeroize::Zeroizing;

use crate::error::StoreError;

/// Storage for one secret value.
pub trait SecretKeyStore {
    /// Whether a value is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn has(&self) -> Result<bool, StoreError>;

    /// Store `plaintext`, trimmed. Blank input is rejected.
    ///
    /// # Errors
    ///
    /// [`StoreError::Validation`] for blank input, or a storage error.
    fn save(&self, plaintext: &str) -> Result<(), StoreError>;

    /// Stored value, if any. A malformed stored value reads as `None`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Integrity`] if the value does not authenticate under the
    /// current key, or a storage error.
    fn get(&self) -> Result<Option<Zeroizing<String>>, StoreError>;
}

/// File-backed [`SecretKeyStore`] for one named slot.
pub struct SealedFileKeyStore {
    path: PathBuf,
    slot: String,
    key: SecretBytes<KEY_LEN_256>,
}

impl std::fmt::Debug for SealedFileKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedFileKeyStore")
            .field("path", &self.path)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl SealedFileKeyStore {
    /// Store for `slot` inside the JSON file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, slot: impl Into<String>, key: SecretBytes<KEY_LEN_256>) -> Self {
        Self {
            path: path.into(),
            slot: slot.into(),
            key,
        }
    }

    fn read_slots(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "secret file unreadable, ignoring");
                BTreeMap::new()
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn write_slots(&self, slots: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(slots)
            .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// `base64(iv):base64(ciphertext||tag)`
fn encode_sealed(sealed: &SealedData) -> String {
    format!(
        "{}:{}",
        BASE64.encode(&sealed.nonce),
        BASE64.encode(&sealed.ciphertext_with_tag())
    )
}

fn decode_sealed(value: &str) -> Option<SealedData> {
    let (iv, data) = value.split_once(':')?;
    if data.contains(':') {
        return None;
    }
    let iv = BASE64.decode(iv.as_bytes()).ok()?;
    let data = BASE64.decode(data.as_bytes()).ok()?;
    SealedData::from_parts(&iv, &data).ok()
}

impl SecretKeyStore for SealedFileKeyStore {
    fn has(&self) -> Result<bool, StoreError> {
        Ok(self.read_slots()?.contains_key(&self.slot))
    }

    fn save(&self, plaintext: &str) -> Result<(), StoreError> {
        let value = plaintext.trim();
        if value.is_empty() {
            return Err(StoreError::Validation("Key must not be blank.".into()));
        }

        let sealed = symmetric::encrypt(value.as_bytes(), self.key.expose(), self.slot.as_bytes())?;
        let mut slots = self.read_slots()?;
        slots.insert(self.slot.clone(), encode_sealed(&sealed));
        self.write_slots(&slots)
    }

    fn get(&self) -> Result<Option<Zeroizing<String>>, StoreError> {
        let slots = self.read_slots()?;
        let Some(stored) = slots.get(&self.slot) else {
            return Ok(None);
        };
        let Some(sealed) = decode_sealed(stored) else {
            warn!(slot = %self.slot, "stored secret is malformed");
            return Ok(None);
        };

        let plain = symmetric::decrypt(&sealed, self.key.expose(), self.slot.as_bytes())?;
        let text = String::from_utf8(plain.to_vec())
            .map_err(|_| StoreError::Integrity("stored secret is not UTF-8".into()))?;
        Ok(Some(Zeroizing::new(text)))
    }
}
