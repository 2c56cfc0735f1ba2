// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the queue layer's boundaries.
//!
//! All traits use `#[async_trait]` so queues and collaborators can be shared
//! as `Arc<dyn ...>`.

pub mod handler;
pub mod queue;

pub use handler::{MessageHandler, NotificationSender};
pub use queue::{MessageConsumer, MessageProducer, NotificationConsumer, NotificationProducer};
