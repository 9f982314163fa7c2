// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn publish_records_call() {
    let adapter = FakeBrokerAdapter::new();
    adapter
        .publish("runner.started.demo", &serde_json::json!({"a": 1}))
        .await
        .unwrap();
    let calls = adapter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].routing_key, "runner.started.demo");
}

#[tokio::test]
async fn fail_next_publish_surfaces_error_once() {
    let adapter = FakeBrokerAdapter::new();
    adapter.fail_next_publish();
    let err = adapter
        .publish("x", &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::PublishFailed(_)));

    adapter.publish("x", &serde_json::json!({})).await.unwrap();
    assert_eq!(adapter.calls().len(), 1);
}
