// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message and notification queues for the notifier.
//!
//! Each queue comes in two flavours behind the same producer/consumer traits
//! from `notifier-core`: a SQLite-backed one shared by every process using the
//! database file, and an in-memory one for single-process deployments and
//! tests. [`Reader`] and [`SenderPool`] run fixed-size worker pools on top.

pub mod consumer;
pub mod messages;
pub mod notifications;
pub mod workers;

mod timestamp;

pub use consumer::BaseConsumer;
pub use messages::{MemoryMessageQueue, MessageQueueStats, SqliteMessageQueue};
pub use notifications::{
    MemoryNotificationQueue, NotificationQueueStats, SqliteNotificationQueue,
};
pub use workers::{Reader, SenderPool};
