// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the notifier queues.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level notifier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    /// Service identity attached to every log line.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// SQLite store and store client retry policy.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Incoming message queue settings.
    #[serde(default)]
    pub messages_queue: MessagesQueueConfig,

    /// Delayed notification queue settings.
    #[serde(default)]
    pub notifications_queue: NotificationsQueueConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name reported in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Identifier of this process among the service's replicas.
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            server_id: default_server_id(),
        }
    }
}

fn default_service_name() -> String {
    "notifier".to_string()
}

fn default_server_id() -> String {
    "local".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long SQLite waits on a locked database before reporting busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Extra attempts made by retrying store operations after a transient error.
    #[serde(default = "default_retries_num")]
    pub retries_num: u32,

    /// Pause between two attempts of a retrying store operation.
    #[serde(default = "default_retries_interval_ms")]
    pub retries_interval_ms: u64,

    /// Deadline for a single store attempt.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retries_interval(&self) -> Duration {
        Duration::from_millis(self.retries_interval_ms)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
            retries_num: default_retries_num(),
            retries_interval_ms: default_retries_interval_ms(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("notifier").join("notifier.db"))
        .and_then(|p| p.to_str().map(str::to_string))
        .unwrap_or_else(|| "notifier.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_retries_num() -> u32 {
    3
}

fn default_retries_interval_ms() -> u64 {
    100
}

fn default_op_timeout_ms() -> u64 {
    5_000
}

/// Incoming message queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagesQueueConfig {
    /// Poll interval when no chat can be leased.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    /// Age after which a lease is considered abandoned and its chat is
    /// handed to another worker. Must exceed the slowest handler.
    #[serde(default = "default_max_processing_time_ms")]
    pub max_processing_time_ms: u64,

    /// Number of reader workers.
    #[serde(default = "default_workers_num")]
    pub workers_num: usize,
}

impl MessagesQueueConfig {
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn max_processing_time(&self) -> Duration {
        Duration::from_millis(self.max_processing_time_ms)
    }
}

impl Default for MessagesQueueConfig {
    fn default() -> Self {
        Self {
            fetch_delay_ms: default_fetch_delay_ms(),
            max_processing_time_ms: default_max_processing_time_ms(),
            workers_num: default_workers_num(),
        }
    }
}

/// Delayed notification queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsQueueConfig {
    /// Poll interval when nothing is due; effectively the scheduling resolution.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    /// Number of sender workers.
    #[serde(default = "default_workers_num")]
    pub workers_num: usize,
}

impl NotificationsQueueConfig {
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

impl Default for NotificationsQueueConfig {
    fn default() -> Self {
        Self {
            fetch_delay_ms: default_fetch_delay_ms(),
            workers_num: default_workers_num(),
        }
    }
}

fn default_fetch_delay_ms() -> u64 {
    50
}

fn default_max_processing_time_ms() -> u64 {
    20_000
}

fn default_workers_num() -> usize {
    10
}
