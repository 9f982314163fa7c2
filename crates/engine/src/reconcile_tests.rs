// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_adapters::{FakeNotifyAdapter, FakeProcessAdapter};
use oj_core::{FakeClock, PeriodGranularity, RunnerConfig, RunnerLaunchRequest, RuntimeKind};
use oj_storage::MemoryStateStore;
use std::path::PathBuf;

fn reconciler(clock: FakeClock) -> (
    Reconciler<FakeProcessAdapter, MemoryStateStore, FakeClock, FakeNotifyAdapter>,
    Arc<MemoryStateStore>,
) {
    let store = Arc::new(MemoryStateStore::default());
    let metrics = Arc::new(crate::metrics::DaemonMetrics::default());
    let supervisor = Supervisor::new(
        FakeProcessAdapter::new(),
        store.clone(),
        clock.clone(),
        metrics.clone(),
        Duration::from_secs(5),
    );
    let budget = BudgetEnforcer::new(store.clone(), FakeNotifyAdapter::new(), clock.clone(), metrics);
    (Reconciler::new(Arc::new(supervisor), Arc::new(budget), 30), store)
}

#[tokio::test]
async fn tick_once_rolls_over_expired_budget_with_no_stale_runners() {
    let clock = FakeClock::at(0);
    let (reconciler, store) = reconciler(clock.clone());
    store
        .create_budget_period(oj_core::BudgetScope::Global, None, 1000, PeriodGranularity::Hourly, 0)
        .await
        .unwrap();
    clock.advance_ms(PeriodGranularity::Hourly.duration_ms() + 1);

    let (stale, rolled) = reconciler.tick_once().await;
    assert_eq!(stale, 0);
    assert_eq!(rolled, 1);
}

#[tokio::test]
async fn tick_once_evicts_a_runner_whose_heartbeat_went_stale() {
    let clock = FakeClock::at(0);
    let (reconciler, store) = reconciler(clock.clone());
    store
        .create_project(oj_core::Project::new("demo", PathBuf::from("/tmp"), 0))
        .await
        .unwrap();
    let runner = store
        .create_runner_tx(
            RunnerLaunchRequest {
                project_name: "demo".into(),
                runtime: RuntimeKind::new_process(),
                config: RunnerConfig::default(),
                max_restart_attempts: 0,
                heartbeat_ttl_seconds: 30,
                session_id: None,
            },
            5,
        )
        .await
        .unwrap();
    store
        .update_runner_heartbeat(
            &oj_core::HeartbeatReport {
                runner_id: runner.id.clone(),
                status: oj_core::RunnerStatus::Running,
                cpu_percent: 1.0,
                memory_mb: 1,
                tokens_used: 0,
                session_id: None,
                agent_version: None,
                hostname: None,
            },
            0,
        )
        .await
        .unwrap();

    clock.advance_ms(60_000);
    let (stale, _rolled) = reconciler.tick_once().await;
    assert_eq!(stale, 1);
}
