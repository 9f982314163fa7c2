// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn make_session() -> Session {
    Session::new(
        SessionId::new("s-1"),
        RunnerId::new("r-1"),
        "demo",
        0,
        None,
    )
}

#[test]
fn new_session_is_resumable() {
    let s = make_session();
    assert!(s.resumable);
    assert!(s.is_resumable());
    assert!(s.ended_at_ms.is_none());
}

#[test]
fn ending_a_session_makes_it_not_resumable_as_candidate() {
    let mut s = make_session();
    s.end(100);
    assert!(!s.is_resumable());
    assert_eq!(s.ended_at_ms, Some(100));
}

#[test]
fn mark_non_resumable_without_ending() {
    let mut s = make_session();
    s.mark_non_resumable();
    assert!(!s.resumable);
    assert!(!s.is_resumable());
}

#[test]
fn record_message_bumps_counters() {
    let mut s = make_session();
    s.record_message(42, 10);
    s.record_message(8, 20);
    assert_eq!(s.message_count, 2);
    assert_eq!(s.tokens_used, 50);
    assert_eq!(s.last_message_at_ms, Some(20));
}
