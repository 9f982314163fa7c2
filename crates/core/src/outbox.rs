// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbox: a persistent queue of domain events produced in the same
//! transaction as the state change they describe.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an event, carried through to the broker so
    /// consumers can dedupe on it.
    pub struct EventId;
}

/// Monotonic primary key of an outbox row. Distinct from `EventId`: the
/// outbox row is a delivery record, `EventId` is the payload's identity.
crate::define_id! {
    pub struct OutboxId;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxId,
    pub event_id: EventId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub routing_key: String,
    pub delivered: bool,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub next_retry_at_ms: Option<i64>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at_ms: i64,
}

impl OutboxEntry {
    pub fn new(
        id: OutboxId,
        event_id: EventId,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        routing_key: impl Into<String>,
        max_attempts: u32,
        now_ms: i64,
    ) -> Self {
        Self {
            id,
            event_id,
            event_type: event_type.into(),
            payload,
            routing_key: routing_key.into(),
            delivered: false,
            attempts: 0,
            max_attempts,
            next_retry_at_ms: None,
            last_error: None,
            created_at_ms: now_ms,
        }
    }

    /// Whether this entry is eligible for another delivery attempt at
    /// `now_ms`, per the `GetPendingOutboxEntries` contract in spec.md §4.1.
    pub fn is_ready(&self, now_ms: i64) -> bool {
        !self.delivered && self.next_retry_at_ms.map(|t| t <= now_ms).unwrap_or(true)
    }

    pub fn has_exhausted_attempts(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Exponential backoff: `now + 2^attempts` seconds, per spec.md §4.1/§4.3.
    pub fn next_retry_delay_secs(attempts: u32) -> i64 {
        2i64.saturating_pow(attempts.min(32))
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
