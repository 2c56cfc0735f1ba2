// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size worker pools draining the queues.
//!
//! [`Reader`] feeds leased messages to a [`MessageHandler`] and finishes each
//! lease afterwards; [`SenderPool`] hands due notifications to a
//! [`NotificationSender`]. Both stop by raising the queue's stop flag and
//! waiting for every worker to return from `get_next`.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use notifier_core::{MessageConsumer, MessageHandler, NotificationConsumer, NotificationSender};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};

/// Handle to a set of spawned workers.
#[derive(Default)]
struct Workers {
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl Workers {
    /// Spawns `count` workers unless they are already running.
    fn start<F, Fut>(&self, pool: &'static str, count: usize, spawn_worker: F) -> bool
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.is_some() {
            debug!(pool, "workers already running");
            return false;
        }
        let mut set = JoinSet::new();
        for worker in 0..count {
            set.spawn(spawn_worker(worker));
        }
        *tasks = Some(set);
        info!(pool, workers = count, "workers started");
        true
    }

    async fn join(&self, pool: &'static str) {
        let set = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut set) = set else {
            return;
        };
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(pool, error = %e, "worker task failed");
            }
        }
        info!(pool, "workers stopped");
    }
}

/// Pool of message readers.
pub struct Reader {
    consumer: Arc<dyn MessageConsumer>,
    handler: Arc<dyn MessageHandler>,
    workers_num: usize,
    workers: Workers,
}

impl Reader {
    pub fn new(
        consumer: Arc<dyn MessageConsumer>,
        handler: Arc<dyn MessageHandler>,
        workers_num: usize,
    ) -> Self {
        Self {
            consumer,
            handler,
            workers_num,
            workers: Workers::default(),
        }
    }

    /// Spawns the workers. Calling it again while they run does nothing.
    pub fn start(&self) -> bool {
        self.workers.start("reader", self.workers_num, |worker| {
            read_messages(
                worker,
                Arc::clone(&self.consumer),
                Arc::clone(&self.handler),
            )
        })
    }

    /// Stops handing out messages and waits for in-flight ones to finish.
    pub async fn stop(&self) {
        self.consumer.stop_giving_msgs();
        self.workers.join("reader").await;
    }
}

async fn read_messages(
    worker: usize,
    consumer: Arc<dyn MessageConsumer>,
    handler: Arc<dyn MessageHandler>,
) {
    debug!(worker, "reader worker started");
    while let Some(leased) = consumer.get_next().await {
        let span = info_span!(
            "message",
            request_id = %leased.message.request_id,
            chat_id = leased.message.chat_id(),
            processing_id = %leased.lease,
        );
        async {
            if let Err(e) = handler.handle(&leased.message).await {
                error!(error = %e, "message handler failed");
            }
            consumer.finish_processing(&leased.lease).await;
        }
        .instrument(span)
        .await;
    }
    debug!(worker, "reader worker stopped");
}

/// Pool of notification senders.
pub struct SenderPool {
    consumer: Arc<dyn NotificationConsumer>,
    sender: Arc<dyn NotificationSender>,
    workers_num: usize,
    workers: Workers,
}

impl SenderPool {
    pub fn new(
        consumer: Arc<dyn NotificationConsumer>,
        sender: Arc<dyn NotificationSender>,
        workers_num: usize,
    ) -> Self {
        Self {
            consumer,
            sender,
            workers_num,
            workers: Workers::default(),
        }
    }

    pub fn start(&self) -> bool {
        self.workers.start("sender", self.workers_num, |worker| {
            send_notifications(
                worker,
                Arc::clone(&self.consumer),
                Arc::clone(&self.sender),
            )
        })
    }

    pub async fn stop(&self) {
        self.consumer.stop_giving_msgs();
        self.workers.join("sender").await;
    }
}

async fn send_notifications(
    worker: usize,
    consumer: Arc<dyn NotificationConsumer>,
    sender: Arc<dyn NotificationSender>,
) {
    debug!(worker, "sender worker started");
    while let Some(notification) = consumer.get_next().await {
        let span = info_span!(
            "notification",
            request_id = %notification.request_id,
            user_id = notification.user_id,
            chat_id = notification.chat_id,
        );
        async {
            if let Err(e) = sender.send(&notification).await {
                error!(error = %e, "failed to send notification");
            }
        }
        .instrument(span)
        .await;
    }
    debug!(worker, "sender worker stopped");
}
