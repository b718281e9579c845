//! Settings and provider secret commands.
//!
//! Neither touches the database, so both keep working after a restore has
//! closed the store.

use serde::{Deserialize, Serialize};
use sitelog_store::preferences::{should_reauth, Settings};
use sitelog_store::{SealedFileKeyStore, SecretKeyStore, StoreError};
use zeroize::Zeroizing;

use super::CommandError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub app_auth_enabled: bool,
    pub reauth_seconds: u32,
    pub trash_retention_days: u32,
}

impl From<Settings> for SettingsDto {
    fn from(s: Settings) -> Self {
        Self {
            app_auth_enabled: s.app_auth_enabled,
            reauth_seconds: s.reauth_seconds,
            trash_retention_days: s.trash_retention_days,
        }
    }
}

/// External weather / geocoding providers whose API keys are kept sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSlot {
    Qweather,
    Amap,
}

impl ProviderSlot {
    /// Slot name inside the secret file.
    #[must_use]
    pub const fn slot_name(self) -> &'static str {
        match self {
            Self::Qweather => "qweather_api_key",
            Self::Amap => "amap_api_key",
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn blocking<T, F>(f: F) -> Result<T, CommandError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CommandError::internal(format!("Settings task failed: {e}")))?
        .map_err(CommandError::from)
}

fn key_store(state: &AppState, slot: ProviderSlot) -> SealedFileKeyStore {
    let config = state.config();
    SealedFileKeyStore::new(
        config.store.layout.secret_path(),
        slot.slot_name(),
        config.device_key.clone(),
    )
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Current settings (defaults when the file is missing or unreadable).
///
/// # Errors
///
/// `INTERNAL_ERROR` if the blocking task fails.
pub async fn get_settings(state: &AppState) -> Result<SettingsDto, CommandError> {
    let data_dir = state.config().store.layout.data_dir().to_path_buf();
    blocking(move || Ok(SettingsDto::from(Settings::load(&data_dir)))).await
}

/// Update and persist settings. Returns what was stored: an unsupported
/// re-auth window keeps the previous value.
///
/// # Errors
///
/// `VALIDATION` for a zero retention period, `IO_ERROR` if saving fails.
pub async fn set_settings(state: &AppState, dto: SettingsDto) -> Result<SettingsDto, CommandError> {
    if dto.trash_retention_days == 0 {
        return Err(CommandError::new(
            "VALIDATION",
            "Trash retention must be at least one day.",
        ));
    }
    let data_dir = state.config().store.layout.data_dir().to_path_buf();
    blocking(move || {
        let mut settings = Settings::load(&data_dir);
        settings.app_auth_enabled = dto.app_auth_enabled;
        settings.set_reauth_seconds(dto.reauth_seconds);
        settings.trash_retention_days = dto.trash_retention_days;
        settings.save(&data_dir)?;
        Ok(SettingsDto::from(settings))
    })
    .await
}

/// Whether coming back from background at `now_ms` needs a fresh unlock.
///
/// # Errors
///
/// `INTERNAL_ERROR` if the blocking task fails.
pub async fn needs_reauth(
    state: &AppState,
    background_at_ms: Option<i64>,
    now_ms: i64,
) -> Result<bool, CommandError> {
    let data_dir = state.config().store.layout.data_dir().to_path_buf();
    blocking(move || {
        let settings = Settings::load(&data_dir);
        Ok(should_reauth(&settings, background_at_ms, now_ms))
    })
    .await
}

/// Seal and store a provider API key.
///
/// # Errors
///
/// `VALIDATION` for a blank key, `IO_ERROR` if the file cannot be written.
pub async fn save_provider_key(
    state: &AppState,
    slot: ProviderSlot,
    value: String,
) -> Result<(), CommandError> {
    let value = Zeroizing::new(value);
    let store = key_store(state, slot);
    blocking(move || store.save(&value)).await
}

/// Whether a provider API key is stored.
///
/// # Errors
///
/// `IO_ERROR` if the file cannot be read.
pub async fn has_provider_key(state: &AppState, slot: ProviderSlot) -> Result<bool, CommandError> {
    let store = key_store(state, slot);
    blocking(move || store.has()).await
}
