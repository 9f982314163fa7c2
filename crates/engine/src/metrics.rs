// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal counters backing `GetStatus` (spec.md §4.6). Metrics exposition
//! in a wire format (Prometheus/OpenMetrics text) is explicitly out of
//! scope; this struct only counts, it never serializes to a scrape endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DaemonMetrics {
    pub runners_launched: AtomicU64,
    pub runners_failed: AtomicU64,
    pub runners_terminated: AtomicU64,
    pub outbox_delivered: AtomicU64,
    pub outbox_retried: AtomicU64,
    pub budget_checks_rejected: AtomicU64,
}

/// Plain-data snapshot for serialization at the API boundary.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub runners_launched: u64,
    pub runners_failed: u64,
    pub runners_terminated: u64,
    pub outbox_delivered: u64,
    pub outbox_retried: u64,
    pub budget_checks_rejected: u64,
}

impl DaemonMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runners_launched: self.runners_launched.load(Ordering::Relaxed),
            runners_failed: self.runners_failed.load(Ordering::Relaxed),
            runners_terminated: self.runners_terminated.load(Ordering::Relaxed),
            outbox_delivered: self.outbox_delivered.load(Ordering::Relaxed),
            outbox_retried: self.outbox_retried.load(Ordering::Relaxed),
            budget_checks_rejected: self.budget_checks_rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
