// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed message queue.
//!
//! A bucket is a `message_buckets` row plus its `bucket_messages` rows in
//! `seq` order. Leasing stamps the bucket with a fresh `processing_id`, the
//! lease time, and the `seq` of the head it hands out (`leased_seq`).
//! Finishing deletes exactly that row, so a finish that is retried after an
//! ambiguous failure never pops a second message.
//!
//! A head that cannot be decoded stalls its chat. Each delivery of it bumps
//! `malformed_attempts`; the delivery that reaches
//! [`MAX_MALFORMED_DELIVERIES`] moves the row to `dead_messages` and frees
//! the bucket.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use notifier_config::model::MessagesQueueConfig;
use notifier_core::{
    LeaseToken, LeasedMessage, Message, MessageConsumer, MessageProducer, NotifierError,
    PutOutcome,
};
use notifier_storage::{StoreClient, StoreError};
use rusqlite::{OptionalExtension, Transaction, params};
use tracing::{debug, error, info, warn};

use super::MessageQueueStats;
use crate::consumer::BaseConsumer;
use crate::timestamp::{millis_before, to_millis};

const BUCKETS: &str = "message_buckets";

/// Deliveries of an undecodable head before it is dead-lettered.
const MAX_MALFORMED_DELIVERIES: i64 = 3;

/// Result of one dequeue transaction.
enum Dequeued {
    Leased { chat_id: i64, message: Message },
    /// The chosen bucket had no messages left and was deleted.
    Empty { chat_id: i64 },
    /// The head could not be decoded; its lease stays until it goes stale.
    Malformed {
        chat_id: i64,
        message_id: i64,
        attempts: i64,
        error: String,
    },
    /// The head reached the delivery limit and was moved to `dead_messages`.
    DeadLettered {
        chat_id: i64,
        message_id: i64,
        error: String,
    },
}

pub struct SqliteMessageQueue {
    client: StoreClient,
    consumer: BaseConsumer,
    max_processing_time: Duration,
}

impl SqliteMessageQueue {
    pub fn new(client: StoreClient, config: &MessagesQueueConfig) -> Self {
        Self::with_settings(client, config.fetch_delay(), config.max_processing_time())
    }

    pub fn with_settings(
        client: StoreClient,
        fetch_delay: Duration,
        max_processing_time: Duration,
    ) -> Self {
        Self {
            client,
            consumer: BaseConsumer::new(fetch_delay),
            max_processing_time,
        }
    }

    /// Creates the indexes the dequeue and lease lookups rely on.
    pub async fn prepare_indexes(&self) -> Result<(), NotifierError> {
        info!("preparing message queue indexes");
        self.client
            .create_index(BUCKETS, false, false, &["head_created_at"])
            .await?;
        self.client
            .create_index(BUCKETS, true, true, &["processing_id"])
            .await?;
        self.client
            .create_index(BUCKETS, true, false, &["chat_id"])
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<MessageQueueStats, NotifierError> {
        let stale_before = millis_before(Utc::now(), self.max_processing_time);
        let stats = self
            .client
            .query(move |tx| {
                Ok(tx.query_row(
                    "SELECT
                        (SELECT COUNT(*) FROM message_buckets),
                        (SELECT COUNT(*) FROM bucket_messages),
                        (SELECT COUNT(*) FROM message_buckets WHERE processing_id IS NOT NULL),
                        (SELECT COUNT(*) FROM message_buckets
                            WHERE processing_id IS NOT NULL AND processed_at < ?1),
                        (SELECT COUNT(*) FROM dead_messages)",
                    params![stale_before],
                    |row| {
                        Ok(MessageQueueStats {
                            buckets: count(row, 0)?,
                            pending_messages: count(row, 1)?,
                            leased_buckets: count(row, 2)?,
                            stale_leases: count(row, 3)?,
                            dead_messages: count(row, 4)?,
                        })
                    },
                )?)
            })
            .await?;
        Ok(stats)
    }

    async fn try_get_next(&self) -> Option<LeasedMessage> {
        let lease = LeaseToken::generate();
        let token = lease.as_str().to_string();
        let now = Utc::now();
        let leased_at = to_millis(now);
        let stale_before = millis_before(now, self.max_processing_time);

        let dequeued = self
            .client
            .find_and_modify(move |tx| lease_next(tx, &token, leased_at, stale_before))
            .await;

        match dequeued {
            Ok(Dequeued::Leased { chat_id, message }) => {
                debug!(
                    chat_id,
                    processing_id = %lease,
                    request_id = %message.request_id,
                    "leased message"
                );
                Some(LeasedMessage { message, lease })
            }
            Ok(Dequeued::Malformed {
                chat_id,
                message_id,
                attempts,
                error,
            }) => {
                error!(
                    chat_id,
                    message_id,
                    processing_id = %lease,
                    attempts,
                    max_attempts = MAX_MALFORMED_DELIVERIES,
                    error = %error,
                    "malformed message at bucket head, chat is stalled until the lease expires"
                );
                None
            }
            Ok(Dequeued::DeadLettered {
                chat_id,
                message_id,
                error,
            }) => {
                error!(
                    chat_id,
                    message_id,
                    error = %error,
                    "malformed message moved to dead_messages, chat resumed"
                );
                None
            }
            Ok(Dequeued::Empty { chat_id }) => {
                debug!(chat_id, "removed empty bucket");
                None
            }
            Err(StoreError::NotFound) => None,
            Err(e) => {
                error!(error = %e, "failed to lease next message");
                None
            }
        }
    }
}

fn count(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(u64::try_from(row.get::<_, i64>(idx)?).unwrap_or_default())
}

/// Leases the eligible bucket with the oldest head.
fn lease_next(
    tx: &Transaction<'_>,
    token: &str,
    leased_at: i64,
    stale_before: i64,
) -> Result<Option<Dequeued>, StoreError> {
    let leased = tx
        .query_row(
            "UPDATE message_buckets
             SET processing_id = ?1,
                 processed_at = ?2,
                 leased_seq = (SELECT MIN(m.seq) FROM bucket_messages m
                               WHERE m.chat_id = message_buckets.chat_id)
             WHERE chat_id = (
                 SELECT chat_id FROM message_buckets
                 WHERE processing_id IS NULL OR processed_at < ?3
                 ORDER BY head_created_at IS NULL, head_created_at, chat_id
                 LIMIT 1
             )
             RETURNING chat_id, leased_seq",
            params![token, leased_at, stale_before],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?)),
        )
        .optional()?;

    let Some((chat_id, leased_seq)) = leased else {
        return Ok(None);
    };

    let Some(seq) = leased_seq else {
        tx.execute(
            "DELETE FROM message_buckets WHERE chat_id = ?1 AND processing_id = ?2",
            params![chat_id, token],
        )?;
        return Ok(Some(Dequeued::Empty { chat_id }));
    };

    let (message_id, payload, attempts): (i64, String, i64) = tx.query_row(
        "SELECT m.message_id, m.payload, b.malformed_attempts
         FROM bucket_messages m JOIN message_buckets b ON b.chat_id = m.chat_id
         WHERE m.seq = ?1",
        params![seq],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let error = match serde_json::from_str::<Message>(&payload) {
        Ok(message) => return Ok(Some(Dequeued::Leased { chat_id, message })),
        Err(e) => e.to_string(),
    };

    let attempts = attempts + 1;
    if attempts < MAX_MALFORMED_DELIVERIES {
        tx.execute(
            "UPDATE message_buckets SET malformed_attempts = ?2 WHERE chat_id = ?1",
            params![chat_id, attempts],
        )?;
        return Ok(Some(Dequeued::Malformed {
            chat_id,
            message_id,
            attempts,
            error,
        }));
    }

    dead_letter(tx, chat_id, seq, &error, leased_at)?;
    Ok(Some(Dequeued::DeadLettered {
        chat_id,
        message_id,
        error,
    }))
}

/// Moves the leased head `seq` to `dead_messages` and releases its bucket,
/// deleting the bucket when nothing else is pending.
fn dead_letter(
    tx: &Transaction<'_>,
    chat_id: i64,
    seq: i64,
    reason: &str,
    dead_at: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO dead_messages (seq, chat_id, message_id, created_at, payload, reason, dead_at)
         SELECT seq, chat_id, message_id, created_at, payload, ?2, ?3
         FROM bucket_messages WHERE seq = ?1",
        params![seq, reason, dead_at],
    )?;
    tx.execute("DELETE FROM bucket_messages WHERE seq = ?1", params![seq])?;

    let deleted = tx.execute(
        "DELETE FROM message_buckets WHERE chat_id = ?1
         AND NOT EXISTS (SELECT 1 FROM bucket_messages m WHERE m.chat_id = ?1)",
        params![chat_id],
    )?;
    if deleted == 0 {
        tx.execute(
            "UPDATE message_buckets
             SET processing_id = NULL,
                 processed_at = NULL,
                 leased_seq = NULL,
                 malformed_attempts = 0,
                 head_created_at = (SELECT m.created_at FROM bucket_messages m
                                    WHERE m.chat_id = ?1
                                    ORDER BY m.seq LIMIT 1)
             WHERE chat_id = ?1",
            params![chat_id],
        )?;
    }
    Ok(())
}

#[async_trait]
impl MessageProducer for SqliteMessageQueue {
    async fn put(&self, msg: &Message) -> Result<PutOutcome, NotifierError> {
        let chat_id = msg.chat_id();
        let message_id = msg.message_id;
        let created_at = to_millis(msg.created_at);
        let payload = serde_json::to_string(msg)?;

        let inserted = self
            .client
            .upsert_retry(move |tx| {
                tx.execute(
                    "INSERT INTO message_buckets (chat_id) VALUES (?1)
                     ON CONFLICT(chat_id) DO NOTHING",
                    params![chat_id],
                )?;
                tx.execute(
                    "INSERT INTO bucket_messages (chat_id, message_id, created_at, payload)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![chat_id, message_id, created_at, payload],
                )?;
                tx.execute(
                    "UPDATE message_buckets SET head_created_at = ?2
                     WHERE chat_id = ?1 AND head_created_at IS NULL",
                    params![chat_id, created_at],
                )?;
                Ok(())
            })
            .await;

        match inserted {
            Ok(()) => {
                debug!(chat_id, message_id, request_id = %msg.request_id, "message queued");
                Ok(PutOutcome::Inserted)
            }
            Err(StoreError::DuplicateKey) => {
                debug!(chat_id, message_id, "message already pending");
                Ok(PutOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MessageConsumer for SqliteMessageQueue {
    async fn get_next(&self) -> Option<LeasedMessage> {
        self.consumer.fetch_loop(|| self.try_get_next()).await
    }

    async fn finish_processing(&self, lease: &LeaseToken) {
        let token = lease.as_str().to_string();
        let popped = self
            .client
            .remove(move |tx| {
                tx.execute(
                    "DELETE FROM bucket_messages WHERE seq =
                        (SELECT leased_seq FROM message_buckets WHERE processing_id = ?1)",
                    params![token],
                )?;
                Ok(tx.execute(
                    "DELETE FROM message_buckets WHERE processing_id = ?1
                     AND NOT EXISTS (SELECT 1 FROM bucket_messages m
                                     WHERE m.chat_id = message_buckets.chat_id)",
                    params![token],
                )?)
            })
            .await;

        match popped {
            Ok(0) => {}
            Ok(_) => {
                debug!(processing_id = %lease, "finished last message of bucket");
                return;
            }
            Err(e) => {
                error!(processing_id = %lease, error = %e, "failed to pop leased message");
                return;
            }
        }

        let token = lease.as_str().to_string();
        let released = self
            .client
            .update_retry(move |tx| {
                Ok(tx.execute(
                    "UPDATE message_buckets
                     SET processing_id = NULL,
                         processed_at = NULL,
                         leased_seq = NULL,
                         malformed_attempts = 0,
                         head_created_at = (SELECT m.created_at FROM bucket_messages m
                                            WHERE m.chat_id = message_buckets.chat_id
                                            ORDER BY m.seq LIMIT 1)
                     WHERE processing_id = ?1",
                    params![token],
                )?)
            })
            .await;

        match released {
            Ok(()) => debug!(processing_id = %lease, "released bucket"),
            Err(StoreError::NotFound) => {
                warn!(processing_id = %lease, "lease is no longer held, bucket was reclaimed");
            }
            Err(e) => error!(processing_id = %lease, error = %e, "failed to release bucket"),
        }
    }

    fn stop_giving_msgs(&self) {
        self.consumer.stop_giving_msgs();
    }
}
