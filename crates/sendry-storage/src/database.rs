// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use tracing::debug;

use sendry_core::SendryError;

use crate::migrations;

/// Convert a tokio-rusqlite error into SendryError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SendryError {
    SendryError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database, cheap to clone via the inner connection.
///
/// Opening runs the PRAGMA setup and all pending migrations.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) a database at the given path and migrate it.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SendryError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| SendryError::Storage {
                source: Box::new(e),
            })?;
        let db = Self::bootstrap(conn, wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open an in-memory database and migrate it. Test use only.
    pub async fn open_in_memory() -> Result<Self, SendryError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| SendryError::Storage {
                source: Box::new(e),
            })?;
        Self::bootstrap(conn, false).await
    }

    async fn bootstrap(conn: tokio_rusqlite::Connection, wal_mode: bool) -> Result<Self, SendryError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| SendryError::Storage {
                source: Box::new(e),
            })?;

        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), SendryError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_and_migrates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        assert!(path.exists(), "database file should be created");

        // Migrated schema should expose the core tables.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                     ('accounts', 'ledger_entries', 'scheduled_tasks', 'moderation_policies', \
                      'warning_records')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        {
            let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
            db.close().await.unwrap();
        }
        // Second open must not fail on already-applied migrations.
        Database::open(path.to_str().unwrap(), true).await.unwrap();
    }
}
