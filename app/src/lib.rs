//! `sitelog-app`: async command shell over the construction log store.
//!
//! The UI layer calls [`init_tracing`] once, then [`bootstrap`] to open the
//! store and run the startup trash sweep, and then drives the async
//! functions in [`commands`] with the returned state.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod commands;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use sitelog_store::clock::now_millis;
use sitelog_store::{LogStore, Settings};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::CommandError;
use state::{AppConfig, AppState, ManagedAppState};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "sitelog=info,sitelog_store=info,sitelog_app=info";

/// Install the global subscriber: stdout plus a daily-rolling file in
/// `log_dir`. Keep the returned guard alive for the life of the process.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard, CommandError> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "sitelog.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| CommandError::internal(format!("Tracing already initialised: {e}")))?;

    Ok(guard)
}

/// Open the store and purge expired trash.
///
/// Settings are read first so the retention period is the configured one.
///
/// # Errors
///
/// `IO_ERROR` if the data directories cannot be created, or a storage error
/// if the database cannot be opened or swept.
pub async fn bootstrap(config: AppConfig) -> Result<ManagedAppState, CommandError> {
    let startup = config.clone();
    let store = tokio::task::spawn_blocking(move || -> Result<LogStore, sitelog_store::StoreError> {
        let layout = &startup.store.layout;
        layout.ensure_dirs()?;
        let settings = Settings::load(layout.data_dir());

        let store = LogStore::open(&layout.db_path(), &startup.store.db_passphrase)?;
        let purged = store.purge_expired(settings.trash_retention_days, now_millis())?;
        info!(
            purged,
            retention_days = settings.trash_retention_days,
            "startup trash sweep finished"
        );
        Ok(store)
    })
    .await
    .map_err(|e| CommandError::internal(format!("Startup task failed: {e}")))??;

    Ok(Arc::new(AppState::new(store, config)))
}
