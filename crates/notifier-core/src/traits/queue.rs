// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer and consumer traits for the message and notification queues.
//!
//! Both the SQLite-backed and the in-memory queues implement these traits, so
//! collaborators (gateway, dispatcher, sender) never touch queue storage
//! directly.

use async_trait::async_trait;

use crate::error::NotifierError;
use crate::types::{LeaseToken, LeasedMessage, Message, Notification, PutOutcome};

/// Write side of the chat-partitioned message queue.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Appends `msg` to its chat's pending sequence.
    ///
    /// Returns [`PutOutcome::AlreadyExists`] when a message with the same id is
    /// already pending for that chat; the pending sequence is left untouched.
    async fn put(&self, msg: &Message) -> Result<PutOutcome, NotifierError>;
}

/// Read side of the chat-partitioned message queue.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Waits until the head of some chat can be leased.
    ///
    /// Returns `None` only after [`stop_giving_msgs`](Self::stop_giving_msgs).
    /// No two live leases ever cover the same chat.
    async fn get_next(&self) -> Option<LeasedMessage>;

    /// Completes the lease: pops the leased message and releases the chat.
    ///
    /// A lease that has already expired and been reclaimed is logged and
    /// ignored.
    async fn finish_processing(&self, lease: &LeaseToken);

    /// Makes every current and future `get_next` return `None`.
    fn stop_giving_msgs(&self);
}

/// Write side of the delayed notification queue.
#[async_trait]
pub trait NotificationProducer: Send + Sync {
    /// Schedules `record` for delivery at its `ready_at`.
    ///
    /// A record with the same `(user_id, chat_id, message_id)` is reported as
    /// [`PutOutcome::AlreadyExists`].
    async fn put(&self, record: &Notification) -> Result<PutOutcome, NotifierError>;

    /// Cancels every pending record for the user in the chat. Returns how many
    /// records were removed.
    async fn discard(&self, user_id: i64, chat_id: i64) -> Result<u64, NotifierError>;
}

/// Read side of the delayed notification queue.
#[async_trait]
pub trait NotificationConsumer: Send + Sync {
    /// Waits until a record is due and removes it from the queue.
    ///
    /// Records sharing a `ready_at` come out in insertion order.
    async fn get_next(&self) -> Option<Notification>;

    fn stop_giving_msgs(&self);
}
