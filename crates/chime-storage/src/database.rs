// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management: WAL mode, schema bootstrap, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so writes
//! are serialized. Do NOT create additional Connection instances for writes.

use std::path::Path;

use chime_core::ChimeError;
use tracing::debug;

/// Name of the alarm table. One row per actor with a pending alarm.
pub const ALARM_TABLE: &str = "_chime_alarm";

const CREATE_ALARM_TABLE: &str = "CREATE TABLE IF NOT EXISTS _chime_alarm (
    actor_unique_key TEXT,
    actor_id TEXT,
    scheduled_time INTEGER,
    PRIMARY KEY (actor_unique_key, actor_id)
) WITHOUT ROWID;";

/// Convert a tokio-rusqlite error into `ChimeError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ChimeError {
    ChimeError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the alarm database. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and ensure the schema exists.
    ///
    /// Parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ChimeError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ChimeError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| ChimeError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.ensure_initialized().await?;
        debug!(path = %path.display(), "alarm database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Contents vanish when the last clone drops.
    pub async fn open_in_memory() -> Result<Self, ChimeError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| ChimeError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.ensure_initialized().await?;
        Ok(db)
    }

    /// Switch to WAL journaling and create the alarm table if missing.
    async fn ensure_initialized(&self) -> Result<(), ChimeError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                // In-memory databases report "memory" and stay that way.
                let mode: String =
                    conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
                debug!(journal_mode = %mode, "journal mode set");
                conn.execute_batch(CREATE_ALARM_TABLE)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// The shared tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ChimeError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), ChimeError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| ChimeError::Storage {
            source: Box::new(e),
        })
    }
}
