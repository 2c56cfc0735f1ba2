// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `notifier stats` command implementation.
//!
//! Prints queue counters read from the shared database, once or on an
//! interval until interrupted.

use std::time::Duration;

use notifier_config::NotifierConfig;
use notifier_core::NotifierError;
use notifier_queue::{
    MessageQueueStats, NotificationQueueStats, SqliteMessageQueue, SqliteNotificationQueue,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::open_client;

/// Structured output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub messages: MessageQueueStats,
    pub notifications: NotificationQueueStats,
}

impl StatsReport {
    fn render_plain(&self) -> String {
        let m = &self.messages;
        let n = &self.notifications;
        format!(
            "messages:      {} buckets, {} pending, {} leased ({} stale), {} dead\n\
             notifications: {} pending, {} ready",
            m.buckets,
            m.pending_messages,
            m.leased_buckets,
            m.stale_leases,
            m.dead_messages,
            n.pending,
            n.ready,
        )
    }
}

/// Runs the `notifier stats` command.
///
/// With `interval`, keeps printing until `shutdown` is cancelled.
pub async fn run_stats(
    config: &NotifierConfig,
    json: bool,
    interval: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<(), NotifierError> {
    let client = open_client(config).await?;
    let messages = SqliteMessageQueue::new(client.clone(), &config.messages_queue);
    let notifications = SqliteNotificationQueue::new(client.clone(), &config.notifications_queue);

    loop {
        let report = StatsReport {
            messages: messages.stats().await?,
            notifications: notifications.stats().await?,
        };
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", report.render_plain());
        }

        let Some(every) = interval else {
            break;
        };
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("stats loop interrupted");
                break;
            }
            _ = tokio::time::sleep(every) => {}
        }
    }

    client.database().close().await?;
    Ok(())
}
