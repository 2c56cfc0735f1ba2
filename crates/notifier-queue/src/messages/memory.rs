// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local message queue with the same contract as the SQLite one.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_config::model::MessagesQueueConfig;
use notifier_core::{
    LeaseToken, LeasedMessage, Message, MessageConsumer, MessageProducer, NotifierError,
    PutOutcome,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::MessageQueueStats;
use crate::consumer::BaseConsumer;

#[derive(Default)]
struct ChatBucket {
    msgs: VecDeque<Message>,
    lease: Option<(LeaseToken, Instant)>,
}

impl ChatBucket {
    fn is_available(&self, now: Instant, max_processing_time: Duration) -> bool {
        match &self.lease {
            None => true,
            Some((_, leased_at)) => now.saturating_duration_since(*leased_at) > max_processing_time,
        }
    }
}

#[derive(Default)]
struct State {
    buckets: HashMap<i64, ChatBucket>,
    /// Non-empty buckets keyed by the creation time of their head.
    order: BTreeSet<(DateTime<Utc>, i64)>,
    by_lease: HashMap<LeaseToken, i64>,
}

pub struct MemoryMessageQueue {
    state: Mutex<State>,
    consumer: BaseConsumer,
    max_processing_time: Duration,
}

impl MemoryMessageQueue {
    pub fn new(config: &MessagesQueueConfig) -> Self {
        Self::with_settings(config.fetch_delay(), config.max_processing_time())
    }

    pub fn with_settings(fetch_delay: Duration, max_processing_time: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            consumer: BaseConsumer::new(fetch_delay),
            max_processing_time,
        }
    }

    pub async fn stats(&self) -> MessageQueueStats {
        let now = Instant::now();
        let state = self.state.lock().await;
        let mut stats = MessageQueueStats {
            buckets: state.buckets.len() as u64,
            ..Default::default()
        };
        for bucket in state.buckets.values() {
            stats.pending_messages += bucket.msgs.len() as u64;
            if bucket.lease.is_some() {
                stats.leased_buckets += 1;
                if bucket.is_available(now, self.max_processing_time) {
                    stats.stale_leases += 1;
                }
            }
        }
        stats
    }

    async fn try_get_next(&self) -> Option<LeasedMessage> {
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let chat_id = state
            .order
            .iter()
            .map(|(_, chat_id)| *chat_id)
            .find(|chat_id| {
                state
                    .buckets
                    .get(chat_id)
                    .is_some_and(|b| b.is_available(now, self.max_processing_time))
            })?;
        let bucket = state.buckets.get_mut(&chat_id)?;
        let message = bucket.msgs.front()?.clone();

        let lease = LeaseToken::generate();
        if let Some((expired, _)) = bucket.lease.replace((lease.clone(), now)) {
            state.by_lease.remove(&expired);
            warn!(chat_id, processing_id = %expired, "reclaimed expired lease");
        }
        state.by_lease.insert(lease.clone(), chat_id);

        debug!(chat_id, processing_id = %lease, request_id = %message.request_id, "leased message");
        Some(LeasedMessage { message, lease })
    }
}

#[async_trait]
impl MessageProducer for MemoryMessageQueue {
    async fn put(&self, msg: &Message) -> Result<PutOutcome, NotifierError> {
        let chat_id = msg.chat_id();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let bucket = state.buckets.entry(chat_id).or_default();
        if bucket.msgs.iter().any(|m| m.message_id == msg.message_id) {
            debug!(chat_id, message_id = msg.message_id, "message already pending");
            return Ok(PutOutcome::AlreadyExists);
        }
        if bucket.msgs.is_empty() {
            state.order.insert((msg.created_at, chat_id));
        }
        bucket.msgs.push_back(msg.clone());

        debug!(chat_id, message_id = msg.message_id, request_id = %msg.request_id, "message queued");
        Ok(PutOutcome::Inserted)
    }
}

#[async_trait]
impl MessageConsumer for MemoryMessageQueue {
    async fn get_next(&self) -> Option<LeasedMessage> {
        self.consumer.fetch_loop(|| self.try_get_next()).await
    }

    async fn finish_processing(&self, lease: &LeaseToken) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(chat_id) = state.by_lease.remove(lease) else {
            warn!(processing_id = %lease, "lease is no longer held, bucket was reclaimed");
            return;
        };
        let Some(bucket) = state.buckets.get_mut(&chat_id) else {
            return;
        };

        bucket.lease = None;
        if let Some(head) = bucket.msgs.pop_front() {
            state.order.remove(&(head.created_at, chat_id));
        }
        match bucket.msgs.front() {
            Some(next) => {
                state.order.insert((next.created_at, chat_id));
                debug!(chat_id, processing_id = %lease, "released bucket");
            }
            None => {
                state.buckets.remove(&chat_id);
                debug!(chat_id, processing_id = %lease, "finished last message of bucket");
            }
        }
    }

    fn stop_giving_msgs(&self) {
        self.consumer.stop_giving_msgs();
    }
}
