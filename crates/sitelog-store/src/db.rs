//! `SQLCipher` database connection, passphrase keying, and migration runner.
//!
//! The log database is encrypted at rest with a fixed application passphrase
//! (`PRAGMA key = '<passphrase>'`), so `SQLCipher` runs its own PBKDF2 over it.

use std::fmt;
use std::path::Path;

use rusqlite::Connection;
use zeroize::Zeroize;

use crate::error::StoreError;

/// Passphrase the database has always been keyed with.
pub const DEFAULT_DB_PASSPHRASE: &str = "construction_log_secure_db_v1";

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1, index 1 → version 2, etc.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/001_initial_schema.sql")];

// ---------------------------------------------------------------------------
// LogDb
// ---------------------------------------------------------------------------

/// Handle to an open, keyed `SQLCipher` log database.
///
/// Holds a [`rusqlite::Connection`] that has already been keyed and migrated.
pub struct LogDb {
    conn: Connection,
}

impl fmt::Debug for LogDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogDb(***)")
    }
}

impl LogDb {
    /// Open (or create) the encrypted log database at `path`.
    ///
    /// 1. Opens the `SQLCipher` database file.
    /// 2. Keys the connection with `passphrase`.
    /// 3. Verifies the key by querying `sqlite_master`.
    /// 4. Enables WAL journal mode and foreign key enforcement.
    /// 5. Runs any pending migrations.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidKey`] if the passphrase does not open the file.
    /// - [`StoreError::Database`] for other `SQLCipher` errors.
    /// - [`StoreError::Migration`] if a migration fails.
    pub fn open(path: &Path, passphrase: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::prepare(conn, passphrase)
    }

    /// Open a keyed in-memory database with the full schema. Used by tests
    /// and previews that must not touch the live file.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_in_memory(passphrase: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(conn, passphrase)
    }

    fn prepare(conn: Connection, passphrase: &str) -> Result<Self, StoreError> {
        apply_key(&conn, passphrase)?;
        verify_key(&conn)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let mut db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Returns a reference to the underlying [`rusqlite::Connection`].
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pragma query fails.
    pub fn schema_version(&self) -> Result<i32, StoreError> {
        let v: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(v)
    }

    /// Fold the write-ahead log back into the main database file so a plain
    /// file copy carries every committed transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the checkpoint fails.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(|e| StoreError::Database(format!("WAL checkpoint failed: {e}")))
    }

    /// Close the connection, surfacing any error `SQLite` reports on close.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection cannot be closed.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::Database(format!("failed to close database: {e}")))
    }

    // -----------------------------------------------------------------------
    // Migration runner
    // -----------------------------------------------------------------------

    /// Apply all pending migrations sequentially.
    ///
    /// Each migration is wrapped in a transaction. The `user_version` pragma
    /// is bumped atomically on commit.
    fn run_migrations(&mut self) -> Result<(), StoreError> {
        let current = self.schema_version()?;

        for (idx, sql) in MIGRATIONS.iter().enumerate() {
            let version = idx
                .checked_add(1)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| StoreError::Migration("migration index overflow".into()))?;

            if version <= current {
                continue;
            }

            let tx = self.conn.transaction().map_err(|e| {
                StoreError::Migration(format!(
                    "failed to start transaction for migration {version}: {e}"
                ))
            })?;

            tx.execute_batch(sql)
                .map_err(|e| StoreError::Migration(format!("migration {version} failed: {e}")))?;

            tx.pragma_update(None, "user_version", version)
                .map_err(|e| {
                    StoreError::Migration(format!(
                        "failed to update user_version to {version}: {e}"
                    ))
                })?;

            tx.commit().map_err(|e| {
                StoreError::Migration(format!("failed to commit migration {version}: {e}"))
            })?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Execute `PRAGMA key` with the passphrase as a quoted string literal.
///
/// The PRAGMA text is zeroized right after use.
fn apply_key(conn: &Connection, passphrase: &str) -> Result<(), StoreError> {
    let mut pragma = format!("PRAGMA key = '{}';", quote_literal(passphrase));
    let result = conn.execute_batch(&pragma);
    pragma.zeroize();
    result?;
    Ok(())
}

/// `SQLCipher` defers key verification until the first read. A wrong key
/// surfaces here as `SQLITE_NOTADB`, mapped to [`StoreError::InvalidKey`].
fn verify_key(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("SELECT count(*) FROM sqlite_master;")?;
    Ok(())
}

/// Escape a value for use inside a single-quoted SQL literal.
fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_literal_doubles_single_quotes() {
        assert_eq!(quote_literal("it's"), "it''s");
        assert_eq!(quote_literal("plain"), "plain");
    }

    #[test]
    fn in_memory_database_is_migrated() {
        let db = LogDb::open_in_memory(DEFAULT_DB_PASSPHRASE).expect("open");
        assert_eq!(db.schema_version().expect("version"), 1);

        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('project', 'construction_log', 'log_image')",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 3);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = LogDb::open_in_memory(DEFAULT_DB_PASSPHRASE).expect("open");
        let enabled: i64 = db
            .connection()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("pragma");
        assert_eq!(enabled, 1);
    }

    /// `LogDb` moves into a `Mutex` shared across threads.
    #[allow(dead_code)]
    const fn assert_send<T: Send>() {}

    #[allow(dead_code)]
    const _: () = assert_send::<LogDb>();
}
