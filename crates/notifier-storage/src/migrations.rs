// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! SQL files under `migrations/` are compiled into the binary with
//! `embed_migrations!` and applied whenever a [`Database`](crate::Database)
//! is opened.

use crate::error::StoreError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies all pending migrations to `conn`.
///
/// Refinery records applied versions in `refinery_schema_history`, so this is
/// safe to run on every open.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), StoreError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    for migration in report.applied_migrations() {
        tracing::info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}
