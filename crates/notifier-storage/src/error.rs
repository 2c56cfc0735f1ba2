// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store error classification.

use std::time::Duration;

use notifier_core::NotifierError;
use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

/// Outcome of a failed store operation.
///
/// [`DuplicateKey`](Self::DuplicateKey), [`NotFound`](Self::NotFound),
/// [`Malformed`](Self::Malformed), [`InvalidRequest`](Self::InvalidRequest) and
/// [`Migration`](Self::Migration) are terminal; retrying cannot change them.
/// Everything else is transient.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key")]
    DuplicateKey,

    /// No row matched the operation's selector.
    #[error("no matching document")]
    NotFound,

    /// A single attempt exceeded its deadline.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored row could not be decoded.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The request itself is wrong (bad identifier, SQL error).
    #[error("invalid store request: {0}")]
    InvalidRequest(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// Connectivity, locking or I/O failure.
    #[error("store unavailable: {source}")]
    Transient {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transient { .. })
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_retriable()
    }

    pub(crate) fn transient(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Transient {
            source: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &e {
            if matches!(
                failure.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ) {
                return Self::DuplicateKey;
            }
        }
        if let Some(code) = e.sqlite_error_code() {
            return match code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::DiskFull
                | ErrorCode::OutOfMemory
                | ErrorCode::FileLockingProtocolFailed => Self::Transient {
                    source: Box::new(e),
                },
                _ => Self::InvalidRequest(e.to_string()),
            };
        }
        match e {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => Self::Malformed(e.to_string()),
            rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidParameterCount(..) => Self::InvalidRequest(e.to_string()),
            other => Self::Transient {
                source: Box::new(other),
            },
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<StoreError> for NotifierError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Timeout(duration) => NotifierError::Timeout { duration },
            StoreError::Malformed(message) => NotifierError::Serialization {
                message,
                source: None,
            },
            other => NotifierError::Storage {
                source: Box::new(other),
            },
        }
    }
}

/// Flattens a `tokio_rusqlite` error whose inner error is already classified.
pub(crate) fn map_tr_err<E: Into<StoreError>>(e: tokio_rusqlite::Error<E>) -> StoreError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner.into(),
        tokio_rusqlite::Error::Close((_, inner)) => inner.into(),
        _ => StoreError::transient("database connection closed"),
    }
}
