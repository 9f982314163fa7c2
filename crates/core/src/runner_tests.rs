// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn make_runner(status: RunnerStatus, last_heartbeat_ms: Option<i64>, ttl: u64) -> Runner {
    Runner {
        id: RunnerId::new("r-1"),
        project_name: "demo".to_string(),
        runtime: RuntimeKind::new_process(),
        status,
        config: RunnerConfig::default(),
        session_id: None,
        usage: RunnerResourceUsage::default(),
        restart_attempts: 0,
        max_restart_attempts: 3,
        started_at_ms: 0,
        last_heartbeat_ms,
        terminated_at_ms: None,
        heartbeat_ttl_seconds: ttl,
        exit_code: None,
    }
}

#[test]
fn stale_exactly_at_ttl_boundary_is_not_stale() {
    let r = make_runner(RunnerStatus::Running, Some(0), 30);
    assert!(!r.is_stale(30_000));
}

#[test]
fn stale_one_second_past_ttl_is_stale() {
    let r = make_runner(RunnerStatus::Running, Some(0), 30);
    assert!(r.is_stale(31_000));
}

#[test]
fn terminal_runners_are_never_stale() {
    let r = make_runner(RunnerStatus::Terminated, Some(0), 30);
    assert!(!r.is_stale(1_000_000));
}

#[test]
fn quota_counts_starting_and_running_only() {
    assert!(RunnerStatus::Starting.counts_toward_quota());
    assert!(RunnerStatus::Running.counts_toward_quota());
    assert!(!RunnerStatus::Paused.counts_toward_quota());
    assert!(!RunnerStatus::Failed.counts_toward_quota());
    assert!(!RunnerStatus::Terminated.counts_toward_quota());
}

#[test]
fn runtime_kind_runtime_id_extracts_pid() {
    let k = RuntimeKind::Process { pid: Some(123) };
    assert_eq!(k.runtime_id(), Some("123".to_string()));
    assert_eq!(RuntimeKind::new_process().runtime_id(), None);
}

#[test]
fn terminal_status_classification() {
    assert!(RunnerStatus::Failed.is_terminal());
    assert!(RunnerStatus::Terminated.is_terminal());
    assert!(!RunnerStatus::Running.is_terminal());
}

#[test]
fn launch_request_round_trips_through_json() {
    let req = RunnerLaunchRequest {
        project_name: "demo".to_string(),
        runtime: RuntimeKind::new_process(),
        config: RunnerConfig::default(),
        max_restart_attempts: 3,
        heartbeat_ttl_seconds: 30,
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    let back: RunnerLaunchRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(req, back);
}

#[test]
fn heartbeat_report_carries_optional_session() {
    let hb = HeartbeatReport {
        runner_id: RunnerId::new("r-1"),
        status: RunnerStatus::Running,
        cpu_percent: 12.5,
        memory_mb: 256,
        tokens_used: 100,
        session_id: Some(SessionId::new("s-1")),
        agent_version: Some("1.2.3".into()),
        hostname: Some("host-a".into()),
    };
    assert_eq!(hb.session_id.as_ref().map(|s| s.as_str()), Some("s-1"));
}
