// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_core::{
    BudgetScope, CoreError, PeriodGranularity, Project, ResourceQuota, RunnerConfig, RuntimeKind,
};
use std::path::PathBuf;

fn launch_request(project: &str) -> RunnerLaunchRequest {
    RunnerLaunchRequest {
        project_name: project.to_string(),
        runtime: RuntimeKind::new_process(),
        config: RunnerConfig::default(),
        max_restart_attempts: 3,
        heartbeat_ttl_seconds: 30,
        session_id: None,
    }
}

async fn seeded_store(project: &str, quota_max: u32) -> MemoryStateStore {
    let store = MemoryStateStore::new();
    store
        .create_project(Project::new(project, PathBuf::from("/tmp/demo"), 0))
        .await
        .unwrap();
    store.with_quota(ResourceQuota::unlimited(project, quota_max))
}

#[tokio::test]
async fn create_project_then_get_returns_equivalent_object() {
    let store = MemoryStateStore::new();
    let created = store
        .create_project(Project::new("demo", PathBuf::from("/tmp/demo"), 0))
        .await
        .unwrap();
    let fetched = store.get_project("demo").await.unwrap();
    assert_eq!(created.name, fetched.name);
    assert_eq!(fetched.status, ProjectStatus::Idle);
    assert_eq!(fetched.counters.total_runners, 0);
}

#[tokio::test]
async fn create_project_twice_fails_already_exists() {
    let store = MemoryStateStore::new();
    store
        .create_project(Project::new("demo", PathBuf::from("/tmp"), 0))
        .await
        .unwrap();
    let err = store
        .create_project(Project::new("demo", PathBuf::from("/tmp"), 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), oj_core::ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn create_runner_tx_fails_not_found_for_unknown_project() {
    let store = MemoryStateStore::new();
    let err = store
        .create_runner_tx(launch_request("ghost"), 5)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), oj_core::ErrorKind::NotFound);
}

#[tokio::test]
async fn quota_boundary_matches_spec_s1() {
    let store = seeded_store("demo", 2).await;
    let r1 = store.create_runner_tx(launch_request("demo"), 2).await;
    let r2 = store.create_runner_tx(launch_request("demo"), 2).await;
    let r3 = store.create_runner_tx(launch_request("demo"), 2).await;
    assert!(r1.is_ok());
    assert!(r2.is_ok());
    assert_eq!(r3.unwrap_err().kind(), oj_core::ErrorKind::QuotaExceeded);

    let runners = store.list_runners(Some("demo")).await.unwrap();
    assert_eq!(runners.len(), 2);
    let entries = store.get_pending_outbox_entries(10, 0).await.unwrap();
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.event_type == "runner.started")
            .count(),
        2
    );
}

#[tokio::test]
async fn reconcile_stale_runners_is_idempotent() {
    let store = seeded_store("demo", 5).await;
    let runner = store.create_runner_tx(launch_request("demo"), 5).await.unwrap();
    store
        .update_runner_heartbeat(
            &oj_core::HeartbeatReport {
                runner_id: runner.id.clone(),
                status: oj_core::RunnerStatus::Running,
                cpu_percent: 1.0,
                memory_mb: 10,
                tokens_used: 0,
                session_id: None,
                agent_version: None,
                hostname: None,
            },
            0,
        )
        .await
        .unwrap();

    let first = store.reconcile_stale_runners(30, 60_000).await.unwrap();
    assert_eq!(first, vec![runner.id.clone()]);
    let second = store.reconcile_stale_runners(30, 60_000).await.unwrap();
    assert!(second.is_empty());

    let reloaded = store.get_runner(runner.id.as_str()).await.unwrap();
    assert_eq!(reloaded.status, oj_core::RunnerStatus::Failed);
}

#[tokio::test]
async fn outbox_retry_schedules_backoff() {
    let store = MemoryStateStore::new();
    store
        .create_project(Project::new("demo", PathBuf::from("/tmp"), 0))
        .await
        .unwrap();
    let store = store.with_quota(ResourceQuota::unlimited("demo", 5));
    store.create_runner_tx(launch_request("demo"), 5).await.unwrap();

    let entries = store.get_pending_outbox_entries(1, 0).await.unwrap();
    let entry = &entries[0];
    store
        .increment_outbox_attempts(&entry.id, "broker down".into(), 0)
        .await
        .unwrap();

    let reloaded = store.get_pending_outbox_entries(1, 0).await.unwrap();
    assert!(reloaded.is_empty(), "entry should not be ready before its backoff elapses");
    let reloaded = store.get_pending_outbox_entries(1, 2_000).await.unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[tokio::test]
async fn budget_rollover_is_idempotent_under_unique_constraint() {
    let store = MemoryStateStore::new();
    store
        .create_budget_period(BudgetScope::Global, None, 1000, PeriodGranularity::Hourly, 0)
        .await
        .unwrap();
    let a = store
        .create_budget_period(BudgetScope::Global, None, 1000, PeriodGranularity::Hourly, 3_600_000)
        .await
        .unwrap();
    let b = store
        .create_budget_period(BudgetScope::Global, None, 1000, PeriodGranularity::Hourly, 3_600_000)
        .await
        .unwrap();
    assert_eq!(a.period_start_ms, b.period_start_ms);
    assert_eq!(store.get_expired_budgets(10_000_000).await.unwrap().len(), 2);
}

#[tokio::test]
async fn session_resume_reports_runner_liveness() {
    let store = seeded_store("demo", 5).await;
    let runner = store.create_runner_tx(launch_request("demo"), 5).await.unwrap();
    let session = store
        .create_session(oj_core::Session::new(
            oj_core::SessionId::new("s-1"),
            runner.id.clone(),
            "demo",
            0,
            None,
        ))
        .await
        .unwrap();
    let resumable = store.list_resumable_sessions("demo").await.unwrap();
    assert_eq!(resumable.len(), 1);
    assert_eq!(resumable[0].id, session.id);
}
