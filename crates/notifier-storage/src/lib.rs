// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite store for the notifier queues.
//!
//! Provides a WAL-mode [`Database`] with embedded migrations and the
//! [`StoreClient`], which runs each queue operation as one transaction with a
//! deadline and a retry policy for transient failures.

pub mod client;
pub mod database;
pub mod error;
pub mod migrations;

pub use client::StoreClient;
pub use database::{Database, MEMORY_PATH};
pub use error::StoreError;

