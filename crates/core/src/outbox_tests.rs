// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn make_entry() -> OutboxEntry {
    OutboxEntry::new(
        OutboxId::new("o-1"),
        EventId::new("e-1"),
        "runner.started",
        serde_json::json!({"runner_id": "r-1"}),
        "runner.started.demo",
        5,
        0,
    )
}

#[test]
fn fresh_entry_is_ready_immediately() {
    let e = make_entry();
    assert!(e.is_ready(0));
}

#[test]
fn delivered_entry_is_never_ready() {
    let mut e = make_entry();
    e.delivered = true;
    assert!(!e.is_ready(1_000_000));
}

#[test]
fn entry_with_future_retry_is_not_ready_until_due() {
    let mut e = make_entry();
    e.next_retry_at_ms = Some(1_000);
    assert!(!e.is_ready(500));
    assert!(e.is_ready(1_000));
    assert!(e.is_ready(1_500));
}

#[test]
fn backoff_grows_exponentially() {
    assert_eq!(OutboxEntry::next_retry_delay_secs(0), 1);
    assert_eq!(OutboxEntry::next_retry_delay_secs(1), 2);
    assert_eq!(OutboxEntry::next_retry_delay_secs(3), 8);
}

#[test]
fn exhausted_attempts_detected() {
    let mut e = make_entry();
    e.attempts = 5;
    assert!(e.has_exhausted_attempts());
    e.attempts = 4;
    assert!(!e.has_exhausted_attempts());
}
