//! `LogStore`: the single writable handle to the log database, plus the
//! observation registry that republishes query results after each commit.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::now_millis;
use crate::db::LogDb;
use crate::error::StoreError;
use crate::logs::{self, LogDraft, LogWithImages};
use crate::media::{self, SweepReport};
use crate::observe::{Change, Observers, QueryKey};
use crate::projects::{self, Project};
use crate::trash;

/// Thread-safe store handle. Every operation locks the connection, commits,
/// then republishes the affected live queries.
#[derive(Debug)]
pub struct LogStore {
    db: Mutex<LogDb>,
    observers: Mutex<Observers>,
}

impl LogStore {
    /// Open the encrypted database at `path`.
    ///
    /// # Errors
    ///
    /// See [`LogDb::open`].
    pub fn open(path: &Path, passphrase: &str) -> Result<Self, StoreError> {
        Ok(Self::from_db(LogDb::open(path, passphrase)?))
    }

    /// Wrap an already-open database.
    #[must_use]
    pub fn from_db(db: LogDb) -> Self {
        Self {
            db: Mutex::new(db),
            observers: Mutex::new(Observers::new()),
        }
    }

    fn db(&self) -> Result<MutexGuard<'_, LogDb>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::Database("store mutex poisoned".into()))
    }

    fn observers(&self) -> Result<MutexGuard<'_, Observers>, StoreError> {
        self.observers
            .lock()
            .map_err(|_| StoreError::Database("observer mutex poisoned".into()))
    }

    /// Republish after a committed mutation. The mutation already took
    /// effect, so a failure here is logged and subscribers keep their
    /// previous value until the next write.
    fn publish(&self, db: &LogDb, change: &Change) {
        if let Err(e) = self.try_publish(db, change) {
            warn!(?change, error = %e, "live query republish failed");
        }
    }

    /// Recompute every live query touched by `change` and push the results.
    fn try_publish(&self, db: &LogDb, change: &Change) -> Result<(), StoreError> {
        let conn = db.connection();
        let mut observers = self.observers()?;
        for key in observers.affected(change) {
            match key {
                QueryKey::Projects => observers.publish_projects(projects::list_projects(conn)?),
                QueryKey::ActiveLogs(p) => {
                    observers.publish_logs(key, logs::list_active_logs(conn, p)?);
                }
                QueryKey::Trash(p) => {
                    observers.publish_logs(key, logs::list_trashed_logs(conn, p)?);
                }
            }
            debug!(?key, "query republished");
        }
        Ok(())
    }

    fn project_of(db: &LogDb, log_id: i64) -> Result<i64, StoreError> {
        logs::get_log(db.connection(), log_id)?
            .map(|l| l.log.project_id)
            .ok_or_else(|| StoreError::NotFound(format!("Log {log_id} does not exist.")))
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// See [`projects::add_project`].
    ///
    /// # Errors
    ///
    /// Validation, conflict or database errors.
    pub fn add_project(&self, name: &str) -> Result<i64, StoreError> {
        let db = self.db()?;
        let id = projects::add_project(db.connection(), name)?;
        self.publish(&db, &Change::Projects);
        Ok(id)
    }

    /// See [`projects::rename_project`].
    ///
    /// # Errors
    ///
    /// Validation, not-found, conflict or database errors.
    pub fn rename_project(&self, id: i64, name: &str) -> Result<(), StoreError> {
        let db = self.db()?;
        projects::rename_project(db.connection(), id, name)?;
        self.publish(&db, &Change::Projects);
        Ok(())
    }

    /// See [`projects::delete_project`].
    ///
    /// # Errors
    ///
    /// Not-found, precondition or database errors.
    pub fn delete_project(&self, id: i64) -> Result<(), StoreError> {
        let db = self.db()?;
        projects::delete_project(db.connection(), id)?;
        self.publish(&db, &Change::Projects);
        Ok(())
    }

    /// All projects, most recently updated first.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        projects::list_projects(self.db()?.connection())
    }

    /// One project by id.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn get_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        projects::get_project(self.db()?.connection(), id)
    }

    /// Logs owned by a project, trashed ones included.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn count_logs_by_project(&self, id: i64) -> Result<i64, StoreError> {
        projects::count_logs_by_project(self.db()?.connection(), id)
    }

    // -----------------------------------------------------------------------
    // Logs
    // -----------------------------------------------------------------------

    /// See [`logs::save_log`].
    ///
    /// # Errors
    ///
    /// Validation, not-found or database errors.
    pub fn save_log(&self, existing_id: Option<i64>, draft: &LogDraft) -> Result<i64, StoreError> {
        let db = self.db()?;
        let previous_project = match existing_id {
            Some(id) => Some(Self::project_of(&db, id)?),
            None => None,
        };

        let id = logs::save_log(db.connection(), existing_id, draft)?;

        let mut touched = vec![draft.project_id];
        touched.extend(previous_project.filter(|p| *p != draft.project_id));
        self.publish(&db, &Change::Logs(touched));
        Ok(id)
    }

    /// Point lookup by id.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn get_log(&self, id: i64) -> Result<Option<LogWithImages>, StoreError> {
        logs::get_log(self.db()?.connection(), id)
    }

    /// Active logs with `start <= date < end`, oldest first.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn logs_in_date_range(
        &self,
        project_id: i64,
        start: i64,
        end: i64,
    ) -> Result<Vec<LogWithImages>, StoreError> {
        logs::logs_in_date_range(self.db()?.connection(), project_id, start, end)
    }

    /// Snapshot of the active logs of a project.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn list_active_logs(&self, project_id: i64) -> Result<Vec<LogWithImages>, StoreError> {
        logs::list_active_logs(self.db()?.connection(), project_id)
    }

    /// Snapshot of the trashed logs of a project.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn list_trashed_logs(&self, project_id: i64) -> Result<Vec<LogWithImages>, StoreError> {
        logs::list_trashed_logs(self.db()?.connection(), project_id)
    }

    // -----------------------------------------------------------------------
    // Trash lifecycle
    // -----------------------------------------------------------------------

    /// Soft-delete a log.
    ///
    /// # Errors
    ///
    /// Not-found or database errors.
    pub fn move_to_trash(&self, id: i64) -> Result<(), StoreError> {
        self.move_to_trash_at(id, now_millis())
    }

    /// Soft-delete a log with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Not-found or database errors.
    pub fn move_to_trash_at(&self, id: i64, deleted_at: i64) -> Result<(), StoreError> {
        let db = self.db()?;
        let project = Self::project_of(&db, id)?;
        trash::move_to_trash_at(db.connection(), id, deleted_at)?;
        self.publish(&db, &Change::Logs(vec![project]));
        Ok(())
    }

    /// Restore a trashed log.
    ///
    /// # Errors
    ///
    /// Not-found or database errors.
    pub fn restore_log(&self, id: i64) -> Result<(), StoreError> {
        let db = self.db()?;
        let project = Self::project_of(&db, id)?;
        trash::restore_log(db.connection(), id)?;
        self.publish(&db, &Change::Logs(vec![project]));
        Ok(())
    }

    /// Hard-delete a log and its images.
    ///
    /// # Errors
    ///
    /// Not-found or database errors.
    pub fn delete_forever(&self, id: i64) -> Result<(), StoreError> {
        let db = self.db()?;
        let project = Self::project_of(&db, id)?;
        trash::delete_forever(db.connection(), id)?;
        self.publish(&db, &Change::Logs(vec![project]));
        Ok(())
    }

    /// Purge trashed logs older than `retention_days`, relative to `now_ms`.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn purge_expired(&self, retention_days: u32, now_ms: i64) -> Result<usize, StoreError> {
        let db = self.db()?;
        let purged = trash::purge_expired(db.connection(), retention_days, now_ms)?;
        if purged > 0 {
            self.publish(&db, &Change::Everything);
        }
        Ok(purged)
    }

    /// Delete every log and project.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn clear_all_data(&self) -> Result<(), StoreError> {
        let db = self.db()?;
        logs::clear_all_data(db.connection())?;
        info!("all logs and projects cleared");
        self.publish(&db, &Change::Everything);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    /// Delete media files no log references. Best effort per file.
    ///
    /// # Errors
    ///
    /// Database errors, or an I/O error listing the directory.
    pub fn cleanup_orphaned_images(&self, media_dir: &Path) -> Result<SweepReport, StoreError> {
        let referenced = logs::referenced_image_uris(self.db()?.connection())?;
        let report = media::sweep_orphans(media_dir, &referenced)?;
        info!(
            removed = report.removed,
            failed = report.failed,
            "orphaned image sweep finished"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Live project list.
    ///
    /// # Errors
    ///
    /// Database errors while computing the initial value.
    pub fn observe_projects(&self) -> Result<watch::Receiver<Vec<Project>>, StoreError> {
        let db = self.db()?;
        let current = projects::list_projects(db.connection())?;
        Ok(self.observers()?.subscribe_projects(current))
    }

    /// Live active logs of a project.
    ///
    /// # Errors
    ///
    /// Database errors while computing the initial value.
    pub fn observe_active_logs(
        &self,
        project_id: i64,
    ) -> Result<watch::Receiver<Vec<LogWithImages>>, StoreError> {
        let db = self.db()?;
        let current = logs::list_active_logs(db.connection(), project_id)?;
        Ok(self
            .observers()?
            .subscribe_logs(QueryKey::ActiveLogs(project_id), current))
    }

    /// Live trash of a project.
    ///
    /// # Errors
    ///
    /// Database errors while computing the initial value.
    pub fn observe_trash(
        &self,
        project_id: i64,
    ) -> Result<watch::Receiver<Vec<LogWithImages>>, StoreError> {
        let db = self.db()?;
        let current = logs::list_trashed_logs(db.connection(), project_id)?;
        Ok(self
            .observers()?
            .subscribe_logs(QueryKey::Trash(project_id), current))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Flush the WAL into the main database file.
    ///
    /// # Errors
    ///
    /// Database errors.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.db()?.checkpoint()
    }

    /// Checkpoint, then run `f` while holding the connection lock so no
    /// write lands in the database files while `f` reads them.
    ///
    /// # Errors
    ///
    /// Database errors from the checkpoint, or whatever `f` returns.
    pub fn with_quiesced_files<T>(
        &self,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let db = self.db()?;
        db.checkpoint()?;
        let result = f();
        drop(db);
        result
    }

    /// Close the connection. Live receivers keep their last value and see
    /// their channel close.
    ///
    /// # Errors
    ///
    /// Database errors on close.
    pub fn close(self) -> Result<(), StoreError> {
        let db = self
            .db
            .into_inner()
            .map_err(|_| StoreError::Database("store mutex poisoned".into()))?;
        db.close()
    }
}
