// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delayed notification queue.
//!
//! Records become visible once `ready_at` has passed and are removed by the
//! same operation that hands them out, so each one is delivered at most once
//! by the queue itself. Pending records of a `(user, chat)` pair can be
//! cancelled in bulk.

mod memory;
mod sqlite;

pub use memory::MemoryNotificationQueue;
pub use sqlite::SqliteNotificationQueue;

use serde::Serialize;

/// Point-in-time counters for a notification queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationQueueStats {
    pub pending: u64,
    /// Pending records whose `ready_at` has passed.
    pub ready: u64,
}
