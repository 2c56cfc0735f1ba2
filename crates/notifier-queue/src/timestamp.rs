// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between `DateTime<Utc>` and the integer milliseconds stored
//! in queue tables.

use std::time::Duration;

use chrono::{DateTime, Utc};
use notifier_storage::StoreError;

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Milliseconds rounded up, so a stored due time is never earlier than `ts`.
pub(crate) fn to_millis_ceil(ts: DateTime<Utc>) -> i64 {
    let ms = ts.timestamp_millis();
    if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
        ms
    } else {
        ms.saturating_add(1)
    }
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Malformed(format!("timestamp {ms} is out of range")))
}

/// `now - age` in milliseconds, saturating instead of overflowing.
pub(crate) fn millis_before(now: DateTime<Utc>, age: Duration) -> i64 {
    let age = i64::try_from(age.as_millis()).unwrap_or(i64::MAX);
    to_millis(now).saturating_sub(age)
}
