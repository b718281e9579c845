//! Non-sensitive app settings: stored as plain JSON next to the database.
//!
//! Readable before the database is opened so the app-lock decision can be
//! made immediately on start.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layout::SETTINGS_FILE;
use crate::trash::DEFAULT_RETENTION_DAYS;

/// Allowed re-authentication windows, in seconds.
pub const REAUTH_OPTIONS_SECONDS: [u32; 3] = [30, 60, 300];

/// Default re-authentication window.
pub const DEFAULT_REAUTH_SECONDS: u32 = 300;

/// Application settings.
///
/// Persisted to `{data_dir}/settings.json`. All fields have defaults, so a
/// file written by an older or newer build still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Require biometric or device-credential unlock on start.
    #[serde(default)]
    pub app_auth_enabled: bool,

    /// Seconds in background after which unlock is required again.
    #[serde(default = "default_reauth_seconds")]
    pub reauth_seconds: u32,

    /// Days a trashed log is kept before the startup sweep removes it.
    #[serde(default = "default_retention_days")]
    pub trash_retention_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_auth_enabled: false,
            reauth_seconds: default_reauth_seconds(),
            trash_retention_days: default_retention_days(),
        }
    }
}

const fn default_reauth_seconds() -> u32 {
    DEFAULT_REAUTH_SECONDS
}
const fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

impl Settings {
    /// Set the re-authentication window. Values outside
    /// [`REAUTH_OPTIONS_SECONDS`] are ignored; returns whether it changed.
    pub fn set_reauth_seconds(&mut self, seconds: u32) -> bool {
        if REAUTH_OPTIONS_SECONDS.contains(&seconds) {
            self.reauth_seconds = seconds;
            true
        } else {
            false
        }
    }

    /// Load settings from `{data_dir}/settings.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or contains
    /// invalid JSON. An out-of-range window or a zero retention read from
    /// disk falls back to the default.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let mut settings: Self = fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| serde_json::from_str(&contents).unwrap_or_default(),
        );
        if !REAUTH_OPTIONS_SECONDS.contains(&settings.reauth_seconds) {
            settings.reauth_seconds = DEFAULT_REAUTH_SECONDS;
        }
        if settings.trash_retention_days == 0 {
            settings.trash_retention_days = DEFAULT_RETENTION_DAYS;
        }
        settings
    }

    /// Persist settings to `{data_dir}/settings.json`.
    ///
    /// Writes to a `.tmp` file and renames it into place.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let tmp = data_dir.join(".settings.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Whether returning from background at `now_ms` requires unlocking again.
///
/// `background_at_ms` is `None` when the app has not been backgrounded since
/// the last unlock.
#[must_use]
pub fn should_reauth(settings: &Settings, background_at_ms: Option<i64>, now_ms: i64) -> bool {
    if !settings.app_auth_enabled {
        return false;
    }
    let Some(background_at) = background_at_ms else {
        return false;
    };
    let window_ms = i64::from(settings.reauth_seconds).saturating_mul(1000);
    now_ms.saturating_sub(background_at) > window_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_values_are_correct() {
        let settings = Settings::default();
        assert!(!settings.app_auth_enabled);
        assert_eq!(settings.reauth_seconds, 300);
        assert_eq!(settings.trash_retention_days, 30);
    }

    #[test]
    fn missing_file_returns_defaults() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(Settings::load(dir.path()), Settings::default());
    }

    #[test]
    fn corrupt_file_returns_defaults() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join(SETTINGS_FILE), "{ not json").expect("write");
        assert_eq!(Settings::load(dir.path()), Settings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"app_auth_enabled": true, "future_field": 1}"#,
        )
        .expect("write");
        let settings = Settings::load(dir.path());
        assert!(settings.app_auth_enabled);
        assert_eq!(settings.reauth_seconds, 300);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().expect("tempdir");
        let mut settings = Settings::default();
        settings.app_auth_enabled = true;
        assert!(settings.set_reauth_seconds(60));
        settings.save(dir.path()).expect("save");
        assert_eq!(Settings::load(dir.path()), settings);
    }

    #[test]
    fn unsupported_window_is_ignored() {
        let mut settings = Settings::default();
        assert!(!settings.set_reauth_seconds(45));
        assert_eq!(settings.reauth_seconds, 300);
    }

    #[test]
    fn out_of_range_window_on_disk_falls_back() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join(SETTINGS_FILE), r#"{"reauth_seconds": 7}"#).expect("write");
        assert_eq!(Settings::load(dir.path()).reauth_seconds, 300);
    }

    #[test]
    fn zero_retention_on_disk_falls_back() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"trash_retention_days": 0}"#,
        )
        .expect("write");
        assert_eq!(Settings::load(dir.path()).trash_retention_days, 30);
    }

    #[test]
    fn reauth_window() {
        let mut settings = Settings {
            app_auth_enabled: true,
            ..Settings::default()
        };
        settings.set_reauth_seconds(30);
        assert!(!should_reauth(&settings, None, 100_000));
        assert!(!should_reauth(&settings, Some(0), 30_000));
        assert!(should_reauth(&settings, Some(0), 30_001));

        settings.app_auth_enabled = false;
        assert!(!should_reauth(&settings, Some(0), 1_000_000));
    }
}
