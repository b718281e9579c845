//! Process-wide state for the command shell.
//!
//! The store handle lives behind a `Mutex<Option<Arc<LogStore>>>`:
//! - `Some(store)` while the database is open
//! - `None` after a backup restore has closed it; every later command
//!   reports `STORE_CLOSED` until the process restarts
//!
//! The selected project is kept in an explicit [`Session`] rather than in
//! ambient globals so tests can build deterministic sessions.

use std::sync::{Arc, Mutex, MutexGuard};

use sitelog_crypto_core::memory::SecretBytes;
use sitelog_crypto_core::symmetric::KEY_LEN_256;
use sitelog_store::{LogStore, Project, StoreConfig};

use crate::commands::CommandError;

// ── Session ────────────────────────────────────────────────────────

/// UI session: which project the log screens are showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    selected_project: Option<i64>,
}

impl Session {
    /// Session with an explicit selection.
    #[must_use]
    pub const fn with_selection(project_id: i64) -> Self {
        Self {
            selected_project: Some(project_id),
        }
    }

    /// Currently selected project, unresolved.
    #[must_use]
    pub const fn selected_project(&self) -> Option<i64> {
        self.selected_project
    }

    /// Select a project.
    pub fn select(&mut self, project_id: i64) {
        self.selected_project = Some(project_id);
    }

    /// Keep the selection if it is still in `projects`, otherwise fall back
    /// to the first listed project. Returns the resolved selection.
    pub fn resolve(&mut self, projects: &[Project]) -> Option<i64> {
        let still_present = self
            .selected_project
            .is_some_and(|id| projects.iter().any(|p| p.id == id));
        if !still_present {
            self.selected_project = projects.first().map(|p| p.id);
        }
        self.selected_project
    }
}

// ── App configuration ──────────────────────────────────────────────

/// Everything the shell needs at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    /// Device key sealing provider secrets; supplied by the platform keystore.
    pub device_key: SecretBytes<KEY_LEN_256>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// ── App state ──────────────────────────────────────────────────────

/// Shared state handed to every command.
#[derive(Debug)]
pub struct AppState {
    store: Mutex<Option<Arc<LogStore>>>,
    session: Mutex<Session>,
    config: AppConfig,
}

/// State as held by the UI layer.
pub type ManagedAppState = Arc<AppState>;

impl AppState {
    /// State around an already-open store.
    #[must_use]
    pub fn new(store: LogStore, config: AppConfig) -> Self {
        Self {
            store: Mutex::new(Some(Arc::new(store))),
            session: Mutex::new(Session::default()),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A handle to the open store.
    ///
    /// # Errors
    ///
    /// `STORE_CLOSED` after a restore, `INTERNAL_ERROR` on a poisoned lock.
    pub fn store(&self) -> Result<Arc<LogStore>, CommandError> {
        let guard = self.store.lock().map_err(|_| CommandError::lock_poisoned("store"))?;
        guard.as_ref().map(Arc::clone).ok_or_else(CommandError::store_closed)
    }

    /// Take the store out of the state, leaving it closed.
    ///
    /// # Errors
    ///
    /// `STORE_CLOSED` if it was already taken, `INTERNAL_ERROR` on a poisoned
    /// lock.
    pub fn take_store(&self) -> Result<Arc<LogStore>, CommandError> {
        let mut guard = self.store.lock().map_err(|_| CommandError::lock_poisoned("store"))?;
        guard.take().ok_or_else(CommandError::store_closed)
    }

    /// Put a store back, e.g. when a restore is refused before closing it.
    ///
    /// # Errors
    ///
    /// `INTERNAL_ERROR` on a poisoned lock.
    pub fn put_store(&self, store: Arc<LogStore>) -> Result<(), CommandError> {
        let mut guard = self.store.lock().map_err(|_| CommandError::lock_poisoned("store"))?;
        *guard = Some(store);
        Ok(())
    }

    /// Whether the store is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.store.lock().is_ok_and(|g| g.is_some())
    }

    /// Lock the UI session.
    ///
    /// # Errors
    ///
    /// `INTERNAL_ERROR` on a poisoned lock.
    pub fn session(&self) -> Result<MutexGuard<'_, Session>, CommandError> {
        self.session.lock().map_err(|_| CommandError::lock_poisoned("session"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: i64) -> Project {
        Project {
            id,
            name: format!("P{id}"),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn resolve_keeps_a_present_selection() {
        let mut session = Session::with_selection(2);
        assert_eq!(session.resolve(&[project(1), project(2)]), Some(2));
    }

    #[test]
    fn resolve_falls_back_to_first() {
        let mut session = Session::with_selection(9);
        assert_eq!(session.resolve(&[project(3), project(1)]), Some(3));
        assert_eq!(session.selected_project(), Some(3));
    }

    #[test]
    fn resolve_with_no_projects_clears() {
        let mut session = Session::with_selection(1);
        assert_eq!(session.resolve(&[]), None);
    }

    #[test]
    fn default_session_picks_first() {
        let mut session = Session::default();
        assert_eq!(session.resolve(&[project(5)]), Some(5));
        session.select(7);
        assert_eq!(session.selected_project(), Some(7));
    }
}
