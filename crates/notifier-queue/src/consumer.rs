// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative polling shared by every queue consumer.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Poll loop with a fixed delay between empty polls and a stop signal.
///
/// Once [`stop_giving_msgs`](Self::stop_giving_msgs) has been called, every
/// running and future [`fetch_loop`](Self::fetch_loop) returns `None`; a loop
/// sleeping between polls wakes up immediately.
#[derive(Debug, Clone)]
pub struct BaseConsumer {
    stop: CancellationToken,
    fetch_delay: Duration,
}

impl BaseConsumer {
    pub fn new(fetch_delay: Duration) -> Self {
        Self {
            stop: CancellationToken::new(),
            fetch_delay,
        }
    }

    pub fn fetch_delay(&self) -> Duration {
        self.fetch_delay
    }

    /// Raises the stop flag. Idempotent.
    pub fn stop_giving_msgs(&self) {
        if !self.stop.is_cancelled() {
            debug!("consumer stopped giving messages");
        }
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Calls `try_fetch` until it yields an item or the consumer stops.
    ///
    /// An item fetched by the poll that raced with the stop signal is still
    /// returned, so a lease taken by that poll is never lost.
    pub async fn fetch_loop<T, F, Fut>(&self, mut try_fetch: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        loop {
            if self.stop.is_cancelled() {
                return None;
            }
            if let Some(item) = try_fetch().await {
                return Some(item);
            }
            tokio::select! {
                _ = self.stop.cancelled() => return None,
                _ = tokio::time::sleep(self.fetch_delay) => {}
            }
        }
    }
}
