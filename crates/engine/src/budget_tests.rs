// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_adapters::FakeNotifyAdapter;
use oj_core::{FakeClock, PeriodGranularity};
use oj_storage::MemoryStateStore;

fn enforcer() -> (
    BudgetEnforcer<MemoryStateStore, FakeNotifyAdapter, FakeClock>,
    FakeNotifyAdapter,
    Arc<MemoryStateStore>,
    FakeClock,
) {
    let store = Arc::new(MemoryStateStore::default());
    let notify = FakeNotifyAdapter::new();
    let clock = FakeClock::at(0);
    let metrics = Arc::new(DaemonMetrics::default());
    let enforcer = BudgetEnforcer::new(store.clone(), notify.clone(), clock.clone(), metrics);
    (enforcer, notify, store, clock)
}

#[tokio::test]
async fn check_budget_passes_when_no_budget_row_exists() {
    let (enforcer, _notify, _store, _clock) = enforcer();
    assert!(enforcer.check_budget("demo", 1_000_000).await.is_ok());
}

#[tokio::test]
async fn check_budget_rejects_when_estimate_exceeds_limit() {
    let (enforcer, _notify, _store, _clock) = enforcer();
    enforcer
        .create_budget(BudgetScope::Project, Some("demo"), 100, PeriodGranularity::Daily)
        .await
        .unwrap();

    let err = enforcer.check_budget("demo", 200).await.unwrap_err();
    assert!(matches!(err, EngineError::BudgetExceeded { .. }));
}

#[tokio::test]
async fn record_usage_fires_warning_on_threshold_cross() {
    let (enforcer, notify, _store, _clock) = enforcer();
    enforcer
        .create_budget(BudgetScope::Project, Some("demo"), 100, PeriodGranularity::Daily)
        .await
        .unwrap();

    enforcer
        .record_usage(BudgetScope::Project, Some("demo"), 80)
        .await
        .unwrap();

    let calls = notify.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].priority, NotifyPriority::High);
}

#[tokio::test]
async fn record_usage_below_threshold_sends_no_notification() {
    let (enforcer, notify, _store, _clock) = enforcer();
    enforcer
        .create_budget(BudgetScope::Project, Some("demo"), 1000, PeriodGranularity::Daily)
        .await
        .unwrap();

    enforcer
        .record_usage(BudgetScope::Project, Some("demo"), 10)
        .await
        .unwrap();

    assert!(notify.calls().is_empty());
}

#[tokio::test]
async fn rollover_expired_creates_next_period_idempotently() {
    let (enforcer, _notify, store, clock) = enforcer();
    enforcer
        .create_budget(BudgetScope::Global, None, 100, PeriodGranularity::Hourly)
        .await
        .unwrap();

    clock.advance_ms(PeriodGranularity::Hourly.duration_ms() + 1);
    let rolled = enforcer.rollover_expired().await.unwrap();
    assert_eq!(rolled, 1);

    // A second rollover pass at the same instant finds nothing expired.
    let rolled_again = enforcer.rollover_expired().await.unwrap();
    assert_eq!(rolled_again, 0);

    let current = store
        .get_token_budget(BudgetScope::Global, None, clock.now_ms())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.used_tokens, 0);
}
