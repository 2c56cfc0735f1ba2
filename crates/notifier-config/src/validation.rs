// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks ranges and cross-field constraints serde cannot express. All
//! problems are collected rather than stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::NotifierConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration.
pub fn validate_config(config: &NotifierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |key: &str, message: String| {
        errors.push(ConfigError::Validation {
            key: key.to_string(),
            message,
        });
    };

    if config.service.name.trim().is_empty() {
        fail("service.name", "must not be empty".to_string());
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(
            "logging.level",
            format!(
                "`{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    let storage = &config.storage;
    if storage.database_path.trim().is_empty() {
        fail("storage.database_path", "must not be empty".to_string());
    }
    if storage.op_timeout_ms == 0 {
        fail("storage.op_timeout_ms", "must be positive".to_string());
    }
    if storage.retries_num > 0 && storage.retries_interval_ms == 0 {
        fail(
            "storage.retries_interval_ms",
            "must be positive when retries are enabled".to_string(),
        );
    }

    let messages = &config.messages_queue;
    if messages.fetch_delay_ms == 0 {
        fail("messages_queue.fetch_delay_ms", "must be positive".to_string());
    }
    if messages.workers_num == 0 {
        fail("messages_queue.workers_num", "must be at least 1".to_string());
    }
    if messages.max_processing_time_ms <= storage.op_timeout_ms {
        fail(
            "messages_queue.max_processing_time_ms",
            format!(
                "must exceed storage.op_timeout_ms ({} <= {})",
                messages.max_processing_time_ms, storage.op_timeout_ms
            ),
        );
    }

    let notifications = &config.notifications_queue;
    if notifications.fetch_delay_ms == 0 {
        fail(
            "notifications_queue.fetch_delay_ms",
            "must be positive".to_string(),
        );
    }
    if notifications.workers_num == 0 {
        fail(
            "notifications_queue.workers_num",
            "must be at least 1".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
