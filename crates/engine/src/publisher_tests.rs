// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_adapters::FakeBrokerAdapter;
use oj_core::{DomainEvent, FakeClock};
use oj_storage::MemoryStateStore;

fn publisher() -> (
    OutboxPublisher<FakeBrokerAdapter, MemoryStateStore, FakeClock>,
    FakeBrokerAdapter,
    Arc<MemoryStateStore>,
) {
    let broker = FakeBrokerAdapter::new();
    let store = Arc::new(MemoryStateStore::default());
    let clock = FakeClock::at(1_000);
    let metrics = Arc::new(DaemonMetrics::default());
    let publisher = OutboxPublisher::new(broker.clone(), store.clone(), clock, metrics, 10, Duration::from_secs(1));
    (publisher, broker, store)
}

#[tokio::test]
async fn drain_once_publishes_pending_entries_and_marks_delivered() {
    let (publisher, broker, store) = publisher();
    store
        .record_event(&DomainEvent::DaemonStarted, 10, 0)
        .await
        .unwrap();

    let delivered = publisher.drain_once().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(broker.calls().len(), 1);

    let pending = store.get_pending_outbox_entries(10, 1_000).await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn drain_once_increments_attempts_on_publish_failure() {
    let (publisher, broker, store) = publisher();
    store
        .record_event(&DomainEvent::DaemonStarted, 10, 0)
        .await
        .unwrap();
    broker.fail_next_publish();

    let delivered = publisher.drain_once().await.unwrap();
    assert_eq!(delivered, 0);

    // Next retry is scheduled in the future (now + 2^1 s), so an
    // immediate re-drain at the same timestamp sees nothing ready.
    let pending = store.get_pending_outbox_entries(10, 0).await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn drain_once_skips_entries_with_exhausted_attempts() {
    let (publisher, broker, store) = publisher();
    let entry = store
        .record_event(&DomainEvent::DaemonStarted, 0, 0)
        .await
        .unwrap();
    assert!(entry.has_exhausted_attempts());

    let delivered = publisher.drain_once().await.unwrap();
    assert_eq!(delivered, 0);
    assert!(broker.calls().is_empty());
}
