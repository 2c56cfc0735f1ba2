// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local notification queue.
//!
//! Records live in a map ordered by `(ready_at, insertion seq)`; a second
//! index maps `(user_id, chat_id)` to the keys of that identity's records so
//! `discard` and duplicate checks do not scan. Both maps change under the
//! same lock.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_config::model::NotificationsQueueConfig;
use notifier_core::{
    Notification, NotificationConsumer, NotificationProducer, NotifierError, PutOutcome,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::NotificationQueueStats;
use crate::consumer::BaseConsumer;

type Key = (DateTime<Utc>, u64);

#[derive(Default)]
struct State {
    next_seq: u64,
    by_ready: BTreeMap<Key, Notification>,
    by_identity: HashMap<(i64, i64), HashMap<i64, Key>>,
}

impl State {
    fn forget_identity(&mut self, record: &Notification) {
        let identity = (record.user_id, record.chat_id);
        if let Some(records) = self.by_identity.get_mut(&identity) {
            records.remove(&record.message_id);
            if records.is_empty() {
                self.by_identity.remove(&identity);
            }
        }
    }
}

pub struct MemoryNotificationQueue {
    state: Mutex<State>,
    consumer: BaseConsumer,
}

impl MemoryNotificationQueue {
    pub fn new(config: &NotificationsQueueConfig) -> Self {
        Self::with_fetch_delay(config.fetch_delay())
    }

    pub fn with_fetch_delay(fetch_delay: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            consumer: BaseConsumer::new(fetch_delay),
        }
    }

    pub async fn stats(&self) -> NotificationQueueStats {
        let now = Utc::now();
        let state = self.state.lock().await;
        NotificationQueueStats {
            pending: state.by_ready.len() as u64,
            ready: state.by_ready.range(..=(now, u64::MAX)).count() as u64,
        }
    }

    async fn try_get_next(&self) -> Option<Notification> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let (&(ready_at, _), _) = state.by_ready.first_key_value()?;
        if ready_at > now {
            return None;
        }
        let (_, record) = state.by_ready.pop_first()?;
        state.forget_identity(&record);
        debug!(
            user_id = record.user_id,
            chat_id = record.chat_id,
            request_id = %record.request_id,
            "dequeued notification"
        );
        Some(record)
    }
}

#[async_trait]
impl NotificationProducer for MemoryNotificationQueue {
    async fn put(&self, record: &Notification) -> Result<PutOutcome, NotifierError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let records = state
            .by_identity
            .entry((record.user_id, record.chat_id))
            .or_default();
        if records.contains_key(&record.message_id) {
            warn!(
                user_id = record.user_id,
                chat_id = record.chat_id,
                message_id = record.message_id,
                request_id = %record.request_id,
                "notification already scheduled"
            );
            return Ok(PutOutcome::AlreadyExists);
        }

        let key = (record.ready_at, state.next_seq);
        state.next_seq += 1;
        records.insert(record.message_id, key);
        state.by_ready.insert(key, record.clone());

        debug!(
            user_id = record.user_id,
            chat_id = record.chat_id,
            request_id = %record.request_id,
            ready_at = %record.ready_at,
            "notification scheduled"
        );
        Ok(PutOutcome::Inserted)
    }

    async fn discard(&self, user_id: i64, chat_id: i64) -> Result<u64, NotifierError> {
        let mut state = self.state.lock().await;
        let Some(records) = state.by_identity.remove(&(user_id, chat_id)) else {
            return Ok(0);
        };
        for key in records.values() {
            state.by_ready.remove(key);
        }
        let removed = records.len() as u64;
        debug!(user_id, chat_id, removed, "discarded notifications");
        Ok(removed)
    }
}

#[async_trait]
impl NotificationConsumer for MemoryNotificationQueue {
    async fn get_next(&self) -> Option<Notification> {
        self.consumer.fetch_loop(|| self.try_get_next()).await
    }

    fn stop_giving_msgs(&self) {
        self.consumer.stop_giving_msgs();
    }
}
