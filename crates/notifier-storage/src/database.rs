// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! Statements run on tokio-rusqlite's background thread. The active connection
//! sits behind an [`ArcSwap`] so a retrying caller can replace a broken one
//! without coordinating with other tasks; calls already issued on the old
//! connection finish on it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notifier_config::model::StorageConfig;
use tracing::{debug, info};

use crate::error::{StoreError, map_tr_err};
use crate::migrations::run_migrations;

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Handle to the queue database.
pub struct Database {
    path: String,
    wal_mode: bool,
    busy_timeout: Duration,
    conn: ArcSwap<tokio_rusqlite::Connection>,
}

impl Database {
    /// Opens the database described by `config` and applies migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        Self::open_with(&config.database_path, config.wal_mode, config.busy_timeout()).await
    }

    /// Opens `path` with explicit settings and applies migrations.
    ///
    /// Missing parent directories are created.
    pub async fn open_with(
        path: &str,
        wal_mode: bool,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if path != MEMORY_PATH {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| StoreError::Transient {
                        source: Box::new(e),
                    })?;
                }
            }
        }

        let conn = connect(path, wal_mode, busy_timeout).await?;
        conn.call(|conn| -> Result<(), StoreError> { run_migrations(conn) })
            .await
            .map_err(map_tr_err)?;

        info!(path, wal_mode, "database opened");
        Ok(Self {
            path: path.to_string(),
            wal_mode,
            busy_timeout,
            conn: ArcSwap::from_pointee(conn),
        })
    }

    /// Opens a private in-memory database. Used by tests and one-off tools.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open_with(MEMORY_PATH, false, Duration::from_secs(5)).await
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the current connection.
    pub fn connection(&self) -> Arc<tokio_rusqlite::Connection> {
        self.conn.load_full()
    }

    /// Replaces the current connection with a freshly opened one.
    ///
    /// In-memory databases cannot be reopened without losing their contents,
    /// so this is a no-op for them.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        if self.path == MEMORY_PATH {
            return Ok(());
        }
        let fresh = connect(&self.path, self.wal_mode, self.busy_timeout).await?;
        self.conn.store(Arc::new(fresh));
        debug!(path = %self.path, "store connection refreshed");
        Ok(())
    }

    /// Checkpoints the WAL so the database file is self-contained.
    pub async fn close(&self) -> Result<(), StoreError> {
        if !self.wal_mode || self.path == MEMORY_PATH {
            return Ok(());
        }
        self.connection()
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

async fn connect(
    path: &str,
    wal_mode: bool,
    busy_timeout: Duration,
) -> Result<tokio_rusqlite::Connection, StoreError> {
    let conn = if path == MEMORY_PATH {
        tokio_rusqlite::Connection::open_in_memory().await
    } else {
        tokio_rusqlite::Connection::open(path).await
    }
    .map_err(StoreError::from)?;

    conn.call(move |conn| -> Result<(), rusqlite::Error> {
        conn.busy_timeout(busy_timeout)?;
        if wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        Ok(())
    })
    .await
    .map_err(map_tr_err)?;

    Ok(conn)
}
