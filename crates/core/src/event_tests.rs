// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runner::RunnerId;
use crate::session::SessionId;

#[test]
fn event_type_matches_serde_rename() {
    let ev = DomainEvent::RunnerStarted {
        runner_id: RunnerId::new("r-1"),
        project_name: "demo".into(),
    };
    assert_eq!(ev.event_type(), "runner.started");
    let json = serde_json::to_value(&ev).unwrap();
    assert_eq!(json["type"], "runner.started");
}

#[test]
fn routing_key_is_namespaced_by_project() {
    let ev = DomainEvent::RunnerFailed {
        runner_id: RunnerId::new("r-1"),
        project_name: "demo".into(),
        reason: "oom".into(),
    };
    assert_eq!(ev.routing_key(), "runner.failed.demo");
}

#[test]
fn budget_warning_routes_by_scope() {
    let ev = DomainEvent::BudgetWarning {
        scope: "project".into(),
        scope_id: Some("demo".into()),
        percent: 90,
        priority: "urgent".into(),
    };
    assert_eq!(ev.routing_key(), "budget.warning.project");
}

#[test]
fn daemon_lifecycle_events_have_no_project_suffix() {
    assert_eq!(DomainEvent::DaemonStarted.routing_key(), "daemon.started");
    assert_eq!(DomainEvent::DaemonStopped.routing_key(), "daemon.stopped");
}

#[test]
fn session_events_round_trip_through_json() {
    let ev = DomainEvent::SessionEnded {
        session_id: SessionId::new("s-1"),
        project_name: "demo".into(),
    };
    let json = serde_json::to_string(&ev).unwrap();
    let back: DomainEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(ev, back);
}
