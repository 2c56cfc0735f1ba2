// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types carried through the message and notification queues.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Generates a fresh correlation id for a request.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A Telegram chat as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub title: String,
}

/// A Telegram user referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Id of the private chat with the user.
    #[serde(default)]
    pub pmid: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// Voice attachment metadata; the audio itself stays with Telegram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub duration: u32,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub sample_rate: u32,
}

/// An inbound chat message waiting in the message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Telegram message id, unique within a chat.
    pub message_id: i64,
    pub request_id: String,
    pub chat: Chat,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub voice: Option<Voice>,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub new_chat_member: Option<User>,
    #[serde(default)]
    pub left_chat_member: Option<User>,
    #[serde(default)]
    pub is_bot_left: bool,
    #[serde(default)]
    pub is_bot_added: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a plain text message stamped with the current time and a new request id.
    pub fn text(chat: Chat, message_id: i64, text: impl Into<String>) -> Self {
        Self {
            message_id,
            request_id: new_request_id(),
            chat,
            text: text.into(),
            voice: None,
            from: None,
            new_chat_member: None,
            left_chat_member: None,
            is_bot_left: false,
            is_bot_added: false,
            created_at: Utc::now(),
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }

    /// Splits the text into a lowercase command and its trimmed arguments.
    ///
    /// `"  /AddLabel  work stuff "` becomes `("/addlabel", "work stuff")`.
    pub fn to_command(&self) -> (String, String) {
        let text = self.text.trim();
        let (cmd, args) = match text.split_once(' ') {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (text, ""),
        };
        (cmd.trim().to_lowercase(), args.to_string())
    }
}

/// A rendered notification scheduled for delivery at `ready_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub request_id: String,
    pub text: String,
    pub ready_at: DateTime<Utc>,
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
}

impl Notification {
    /// Builds a notification that becomes deliverable after the user's delay.
    pub fn new(
        user_id: i64,
        delay: Duration,
        message_id: i64,
        chat_id: i64,
        text: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        Self {
            request_id: request_id.into(),
            text: text.into(),
            ready_at: now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
            user_id,
            chat_id,
            message_id,
        }
    }

    /// Whether the notification may be delivered at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.ready_at <= now
    }
}

/// Opaque token identifying one lease on a chat bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseToken(pub String);

impl LeaseToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed to a worker together with the lease it must finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedMessage {
    pub message: Message,
    pub lease: LeaseToken,
}

/// Result of a producer `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PutOutcome {
    /// The item was enqueued.
    Inserted,
    /// An item with the same identity is already pending; nothing changed.
    AlreadyExists,
}

impl PutOutcome {
    pub fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}
