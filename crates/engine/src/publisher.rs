// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional outbox drainer (spec.md §4.3): delivers every outbox row
//! to the broker at least once, with bounded exponential-backoff retries.

use crate::error::Result;
use crate::metrics::DaemonMetrics;
use oj_adapters::BrokerAdapter;
use oj_core::{Clock, OutboxEntry};
use oj_storage::StateStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct OutboxPublisher<B, S, C> {
    broker: B,
    store: Arc<S>,
    clock: C,
    metrics: Arc<DaemonMetrics>,
    batch_size: i64,
    confirm_timeout: Duration,
}

impl<B, S, C> OutboxPublisher<B, S, C>
where
    B: BrokerAdapter,
    S: StateStore,
    C: Clock,
{
    pub fn new(broker: B, store: Arc<S>, clock: C, metrics: Arc<DaemonMetrics>, batch_size: i64, confirm_timeout: Duration) -> Self {
        Self { broker, store, clock, metrics, batch_size, confirm_timeout }
    }

    /// Drain one batch of pending entries. Returns the number delivered.
    /// Called on a `tokio::time::interval` tick by the caller; isolating
    /// this from the loop makes it independently testable.
    pub async fn drain_once(&self) -> Result<usize> {
        let now_ms = self.clock.now_ms();
        let entries = self.store.get_pending_outbox_entries(self.batch_size, now_ms).await?;
        let mut delivered = 0;
        for entry in entries {
            if entry.has_exhausted_attempts() {
                tracing::warn!(outbox_id = %entry.id, attempts = entry.attempts, "outbox entry exhausted retries, skipping");
                continue;
            }
            if self.publish_one(&entry).await {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn publish_one(&self, entry: &OutboxEntry) -> bool {
        let result = tokio::time::timeout(self.confirm_timeout, self.broker.publish(&entry.routing_key, &entry.payload)).await;
        let now_ms = self.clock.now_ms();
        match result {
            Ok(Ok(())) => {
                if let Err(e) = self.store.mark_outbox_delivered(&entry.id).await {
                    tracing::error!(outbox_id = %entry.id, error = %e, "failed to mark outbox entry delivered");
                }
                self.metrics.outbox_delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Err(e)) => {
                self.record_failure(entry, e.to_string(), now_ms).await;
                false
            }
            Err(_) => {
                self.record_failure(entry, "publisher confirm timed out".to_string(), now_ms).await;
                false
            }
        }
    }

    async fn record_failure(&self, entry: &OutboxEntry, message: String, now_ms: i64) {
        if let Err(e) = self.store.increment_outbox_attempts(&entry.id, message, now_ms).await {
            tracing::error!(outbox_id = %entry.id, error = %e, "failed to record outbox delivery failure");
        }
        self.metrics.outbox_retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Runs until `stop` is cancelled. On shutdown the current batch is
    /// allowed to finish; anything still pending is left for the next
    /// process to pick up (spec.md §4.3 cancellation).
    pub async fn run(&self, interval: Duration, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::info!("outbox publisher shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once().await {
                        tracing::error!(error = %e, "outbox drain failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
