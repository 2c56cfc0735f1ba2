// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-partitioned message queue.
//!
//! Messages of one chat form a FIFO bucket. A worker leases the head of the
//! bucket whose head is oldest, processes it, and finishes the lease, which
//! pops the head and frees the chat for the next message. While a lease is
//! live no other worker can take a message from that chat. A lease older than
//! `max_processing_time` is considered abandoned and the same head is handed
//! out again.

mod memory;
mod sqlite;

pub use memory::MemoryMessageQueue;
pub use sqlite::SqliteMessageQueue;

use serde::Serialize;

/// Point-in-time counters for a message queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessageQueueStats {
    /// Chats with pending messages.
    pub buckets: u64,
    pub pending_messages: u64,
    /// Chats currently leased by a worker, including abandoned leases.
    pub leased_buckets: u64,
    /// Leases older than `max_processing_time`.
    pub stale_leases: u64,
    /// Undecodable heads moved to `dead_messages`. Always zero in memory.
    pub dead_messages: u64,
}
