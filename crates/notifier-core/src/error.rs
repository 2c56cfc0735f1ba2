// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the notifier queue layer.

use thiserror::Error;

/// The primary error type returned by queue producers, consumers, and handlers.
///
/// Duplicates and "nothing to do" outcomes are not errors: producers report
/// duplicates through [`PutOutcome`](crate::types::PutOutcome) and consumers
/// report an empty poll by returning nothing.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Store errors that survived the retry policy (connectivity, busy database).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A persisted document does not match the expected shape.
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A handler or sender collaborator failed to process an item.
    #[error("handler error: {message}")]
    Handler {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },
}

impl From<serde_json::Error> for NotifierError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}
