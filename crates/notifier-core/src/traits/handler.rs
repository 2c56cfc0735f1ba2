// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator seams driven by the worker pools.

use async_trait::async_trait;

use crate::error::NotifierError;
use crate::types::{Message, Notification};

/// Business logic applied to each dequeued message (the bot dispatcher).
///
/// Delivery is at-least-once: a message whose lease expired before it was
/// finished is handed out again, so implementations must tolerate repeats.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: &Message) -> Result<(), NotifierError>;
}

/// Delivers a due notification to the user (the messenger).
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifierError>;
}
