// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed notification queue.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use notifier_config::model::NotificationsQueueConfig;
use notifier_core::{
    Notification, NotificationConsumer, NotificationProducer, NotifierError, PutOutcome,
};
use notifier_storage::{StoreClient, StoreError};
use rusqlite::{OptionalExtension, Transaction, params};
use tracing::{debug, error, info, warn};

use super::NotificationQueueStats;
use crate::consumer::BaseConsumer;
use crate::timestamp::{from_millis, to_millis, to_millis_ceil};

const NOTIFICATIONS: &str = "notifications";

pub struct SqliteNotificationQueue {
    client: StoreClient,
    consumer: BaseConsumer,
}

impl SqliteNotificationQueue {
    pub fn new(client: StoreClient, config: &NotificationsQueueConfig) -> Self {
        Self::with_fetch_delay(client, config.fetch_delay())
    }

    pub fn with_fetch_delay(client: StoreClient, fetch_delay: Duration) -> Self {
        Self {
            client,
            consumer: BaseConsumer::new(fetch_delay),
        }
    }

    /// Creates the due-time index and ensures the identity uniqueness index.
    ///
    /// Migrations already create the identity index; re-issuing it here is a
    /// no-op on current schemas.
    pub async fn prepare_indexes(&self) -> Result<(), NotifierError> {
        info!("preparing notification queue indexes");
        self.client
            .create_index(NOTIFICATIONS, false, false, &["ready_at"])
            .await?;
        self.client
            .create_index(
                NOTIFICATIONS,
                true,
                false,
                &["user_id", "chat_id", "message_id"],
            )
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<NotificationQueueStats, NotifierError> {
        let now = to_millis(Utc::now());
        let (pending, ready) = self
            .client
            .query(move |tx| {
                Ok(tx.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(ready_at <= ?1), 0) FROM notifications",
                    params![now],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )?)
            })
            .await?;
        Ok(NotificationQueueStats {
            pending: u64::try_from(pending).unwrap_or_default(),
            ready: u64::try_from(ready).unwrap_or_default(),
        })
    }

    async fn try_get_next(&self) -> Option<Notification> {
        let now = to_millis(Utc::now());
        match self.client.find_and_modify(move |tx| take_ready(tx, now)).await {
            Ok(record) => {
                debug!(
                    user_id = record.user_id,
                    chat_id = record.chat_id,
                    request_id = %record.request_id,
                    "dequeued notification"
                );
                Some(record)
            }
            Err(StoreError::NotFound) => None,
            Err(e) => {
                error!(error = %e, "failed to dequeue notification");
                None
            }
        }
    }
}

/// Removes and returns the earliest due record, oldest insert first on ties.
fn take_ready(tx: &Transaction<'_>, now: i64) -> Result<Option<Notification>, StoreError> {
    let row = tx
        .query_row(
            "DELETE FROM notifications WHERE id = (
                 SELECT id FROM notifications
                 WHERE ready_at <= ?1
                 ORDER BY ready_at, id
                 LIMIT 1
             )
             RETURNING request_id, text, ready_at, user_id, chat_id, message_id",
            params![now],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    row.map(|(request_id, text, ready_at, user_id, chat_id, message_id)| {
        Ok(Notification {
            request_id,
            text,
            ready_at: from_millis(ready_at)?,
            user_id,
            chat_id,
            message_id,
        })
    })
    .transpose()
}

#[async_trait]
impl NotificationProducer for SqliteNotificationQueue {
    async fn put(&self, record: &Notification) -> Result<PutOutcome, NotifierError> {
        let rec = record.clone();
        let ready_at = to_millis_ceil(record.ready_at);
        let inserted = self
            .client
            .insert_retry(move |tx| {
                tx.execute(
                    "INSERT INTO notifications
                         (request_id, text, ready_at, user_id, chat_id, message_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        rec.request_id,
                        rec.text,
                        ready_at,
                        rec.user_id,
                        rec.chat_id,
                        rec.message_id
                    ],
                )?;
                Ok(())
            })
            .await;

        match inserted {
            Ok(()) => {
                debug!(
                    user_id = record.user_id,
                    chat_id = record.chat_id,
                    request_id = %record.request_id,
                    ready_at = %record.ready_at,
                    "notification scheduled"
                );
                Ok(PutOutcome::Inserted)
            }
            Err(StoreError::DuplicateKey) => {
                warn!(
                    user_id = record.user_id,
                    chat_id = record.chat_id,
                    message_id = record.message_id,
                    request_id = %record.request_id,
                    "notification already scheduled"
                );
                Ok(PutOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn discard(&self, user_id: i64, chat_id: i64) -> Result<u64, NotifierError> {
        let removed = self
            .client
            .remove(move |tx| {
                Ok(tx.execute(
                    "DELETE FROM notifications WHERE user_id = ?1 AND chat_id = ?2",
                    params![user_id, chat_id],
                )?)
            })
            .await?;
        debug!(user_id, chat_id, removed, "discarded notifications");
        Ok(removed)
    }
}

#[async_trait]
impl NotificationConsumer for SqliteNotificationQueue {
    async fn get_next(&self) -> Option<Notification> {
        self.consumer.fetch_loop(|| self.try_get_next()).await
    }

    fn stop_giving_msgs(&self) {
        self.consumer.stop_giving_msgs();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeDelta};
    use notifier_storage::Database;

    use super::*;

    async fn queue() -> (SqliteNotificationQueue, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.db");
        let db = Database::open_with(path.to_str().unwrap(), true, Duration::from_secs(1))
            .await
            .unwrap();
        let client = StoreClient::with_policy(
            Arc::new(db),
            2,
            Duration::from_millis(1),
            Duration::from_secs(2),
        );
        let queue = SqliteNotificationQueue::with_fetch_delay(client, Duration::from_millis(5));
        queue.prepare_indexes().await.unwrap();
        (queue, dir)
    }

    fn record(user_id: i64, chat_id: i64, message_id: i64, ready_at: DateTime<Utc>) -> Notification {
        Notification {
            request_id: format!("req-{message_id}"),
            text: format!("text {message_id}"),
            ready_at,
            user_id,
            chat_id,
            message_id,
        }
    }

    #[tokio::test]
    async fn future_record_is_not_visible() {
        let (queue, _dir) = queue().await;
        let later = Utc::now() + TimeDelta::hours(1);
        queue.put(&record(1, 2, 3, later)).await.unwrap();

        assert!(queue.try_get_next().await.is_none());
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats, NotificationQueueStats { pending: 1, ready: 0 });
    }

    #[tokio::test]
    async fn due_record_is_removed_on_dequeue() {
        let (queue, _dir) = queue().await;
        let past = Utc::now() - TimeDelta::seconds(1);
        queue.put(&record(1, 2, 3, past)).await.unwrap();

        let got = queue.try_get_next().await.unwrap();
        assert_eq!(got.message_id, 3);
        assert_eq!(got.ready_at.timestamp_millis(), to_millis_ceil(past));
        assert!(got.ready_at >= past);
        assert!(queue.try_get_next().await.is_none());
    }

    #[tokio::test]
    async fn equal_ready_at_comes_out_in_insert_order() {
        let (queue, _dir) = queue().await;
        let at = Utc::now() - TimeDelta::seconds(5);
        for message_id in [30, 10, 20] {
            queue.put(&record(1, 2, message_id, at)).await.unwrap();
        }
        let mut order = Vec::new();
        while let Some(n) = queue.try_get_next().await {
            order.push(n.message_id);
        }
        assert_eq!(order, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn duplicate_identity_is_already_exists() {
        let (queue, _dir) = queue().await;
        let at = Utc::now();
        assert_eq!(
            queue.put(&record(1, 2, 3, at)).await.unwrap(),
            PutOutcome::Inserted
        );
        assert_eq!(
            queue.put(&record(1, 2, 3, at)).await.unwrap(),
            PutOutcome::AlreadyExists
        );
        assert_eq!(queue.stats().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn sub_millisecond_ready_at_is_not_due_at_its_floor() {
        let (queue, _dir) = queue().await;
        let base = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let ready_at = base + TimeDelta::microseconds(500);
        queue.put(&record(1, 2, 3, ready_at)).await.unwrap();

        let floor = to_millis(ready_at);
        let early = queue
            .client
            .find_and_modify(move |tx| take_ready(tx, floor))
            .await;
        assert!(matches!(early, Err(StoreError::NotFound)));

        let got = queue
            .client
            .find_and_modify(move |tx| take_ready(tx, floor + 1))
            .await
            .unwrap();
        assert!(got.ready_at >= ready_at);
    }

    #[tokio::test]
    async fn identity_is_unique_without_prepare_indexes() {
        let db = Database::open_in_memory().await.unwrap();
        let client = StoreClient::with_policy(
            Arc::new(db),
            2,
            Duration::from_millis(1),
            Duration::from_secs(2),
        );
        let queue = SqliteNotificationQueue::with_fetch_delay(client, Duration::from_millis(5));
        let at = Utc::now() + TimeDelta::minutes(1);

        assert_eq!(
            queue.put(&record(1, 2, 3, at)).await.unwrap(),
            PutOutcome::Inserted
        );
        assert_eq!(
            queue.put(&record(1, 2, 3, at + TimeDelta::seconds(1))).await.unwrap(),
            PutOutcome::AlreadyExists
        );
        assert_eq!(queue.stats().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn discard_removes_only_matching_identity() {
        let (queue, _dir) = queue().await;
        let at = Utc::now() + TimeDelta::minutes(5);
        queue.put(&record(1, 2, 1, at)).await.unwrap();
        queue.put(&record(1, 2, 2, at)).await.unwrap();
        queue.put(&record(1, 3, 1, at)).await.unwrap();
        queue.put(&record(4, 2, 1, at)).await.unwrap();

        assert_eq!(queue.discard(1, 2).await.unwrap(), 2);
        assert_eq!(queue.discard(1, 2).await.unwrap(), 0);
        assert_eq!(queue.stats().await.unwrap().pending, 2);
    }
}
