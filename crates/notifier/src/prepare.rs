// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `notifier prepare-indexes` command implementation.

use notifier_config::NotifierConfig;
use notifier_core::NotifierError;
use notifier_queue::{SqliteMessageQueue, SqliteNotificationQueue};
use tracing::info;

use crate::open_client;

/// Opens the database (applying pending migrations) and creates every queue
/// index. Safe to run repeatedly.
pub async fn run_prepare_indexes(config: &NotifierConfig) -> Result<(), NotifierError> {
    let client = open_client(config).await?;

    SqliteMessageQueue::new(client.clone(), &config.messages_queue)
        .prepare_indexes()
        .await?;
    SqliteNotificationQueue::new(client.clone(), &config.notifications_queue)
        .prepare_indexes()
        .await?;

    client.database().close().await?;
    info!(path = %config.storage.database_path, "queue indexes ready");
    Ok(())
}
