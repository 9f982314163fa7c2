// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background reconciliation loop (spec.md §4.2 "reconcile stale runners"
//! and §4.4 rollover): periodically sweeps runners whose heartbeat has
//! gone quiet and materializes the next budget period for anything
//! expired, mirroring `OutboxPublisher::run`'s tick-and-select shape.

use crate::budget::BudgetEnforcer;
use crate::supervisor::Supervisor;
use oj_adapters::{NotifyAdapter, ProcessAdapter};
use oj_core::Clock;
use oj_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Holds the supervisor and budget enforcer behind `Arc` rather than by
/// value so the daemon can share the exact same instances (and therefore
/// the same runner registry) with the API facade instead of reconciling
/// against a second, divergent copy.
pub struct Reconciler<P, S, C, N> {
    supervisor: Arc<Supervisor<P, S, C>>,
    budget: Arc<BudgetEnforcer<S, N, C>>,
    heartbeat_ttl_default_secs: u64,
}

impl<P, S, C, N> Reconciler<P, S, C, N>
where
    P: ProcessAdapter,
    S: StateStore,
    C: Clock,
    N: NotifyAdapter,
{
    pub fn new(supervisor: Arc<Supervisor<P, S, C>>, budget: Arc<BudgetEnforcer<S, N, C>>, heartbeat_ttl_default_secs: u64) -> Self {
        Self { supervisor, budget, heartbeat_ttl_default_secs }
    }

    /// One sweep: evict stale runners, then roll over any expired budget
    /// periods. Returns `(stale_evicted, budgets_rolled)`.
    pub async fn tick_once(&self) -> (usize, usize) {
        let stale = match self.supervisor.reconcile_runners(self.heartbeat_ttl_default_secs).await {
            Ok(ids) => ids.len(),
            Err(e) => {
                tracing::error!(error = %e, "stale runner reconciliation failed");
                0
            }
        };
        let rolled = match self.budget.rollover_expired().await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "budget rollover failed");
                0
            }
        };
        (stale, rolled)
    }

    pub async fn run(&self, interval: Duration, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::info!("reconciler shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    let (stale, rolled) = self.tick_once().await;
                    if stale > 0 || rolled > 0 {
                        tracing::debug!(stale, rolled, "reconciliation sweep complete");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
