// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the notifier queue layer.
//!
//! Provides the error type, the domain types that travel through the queues,
//! and the producer/consumer traits implemented by every queue backend.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::NotifierError;
pub use types::{
    Chat, LeaseToken, LeasedMessage, Message, Notification, PutOutcome, User, Voice,
    new_request_id,
};

pub use traits::{
    MessageConsumer, MessageHandler, MessageProducer, NotificationConsumer, NotificationProducer,
    NotificationSender,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_error_variants_render() {
        let storage = NotifierError::Storage {
            source: Box::new(std::io::Error::other("disk gone")),
        };
        assert_eq!(storage.to_string(), "storage error: disk gone");

        let timeout = NotifierError::Timeout {
            duration: std::time::Duration::from_secs(5),
        };
        assert_eq!(timeout.to_string(), "operation timed out after 5s");

        let handler = NotifierError::Handler {
            message: "telegram refused".into(),
            source: None,
        };
        assert!(handler.to_string().contains("telegram refused"));
    }

    #[test]
    fn serde_error_converts_to_serialization() {
        let err = serde_json::from_str::<Message>("{").unwrap_err();
        let err: NotifierError = err.into();
        assert!(matches!(err, NotifierError::Serialization { .. }));
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_message_producer<T: MessageProducer>() {}
        fn _assert_message_consumer<T: MessageConsumer>() {}
        fn _assert_notification_producer<T: NotificationProducer>() {}
        fn _assert_notification_consumer<T: NotificationConsumer>() {}
        fn _assert_message_handler<T: MessageHandler>() {}
        fn _assert_notification_sender<T: NotificationSender>() {}
    }
}
