// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn cfg() -> ProcessSpawnConfig {
    ProcessSpawnConfig {
        command: "runner-bin".to_string(),
        args: vec!["--id".to_string(), "r-1".to_string()],
        env: Vec::new(),
        cwd: PathBuf::from("."),
    }
}

#[tokio::test]
async fn spawn_records_call_and_returns_alive_handle() {
    let adapter = FakeProcessAdapter::new();
    let (handle, pid) = adapter.spawn(cfg()).await.unwrap();
    assert!(pid.is_some());
    assert!(adapter.is_alive(&handle).await.unwrap());
    assert!(matches!(adapter.calls()[0], ProcessCall::Spawn { .. }));
}

#[tokio::test]
async fn fail_next_spawn_surfaces_spawn_failed() {
    let adapter = FakeProcessAdapter::new();
    adapter.fail_next_spawn();
    let err = adapter.spawn(cfg()).await.unwrap_err();
    assert!(matches!(err, ProcessError::SpawnFailed(_)));

    // only the next spawn fails
    let (handle, _) = adapter.spawn(cfg()).await.unwrap();
    assert!(adapter.is_alive(&handle).await.unwrap());
}

#[tokio::test]
async fn set_exited_flips_liveness_and_exit_code() {
    let adapter = FakeProcessAdapter::new();
    let (handle, _) = adapter.spawn(cfg()).await.unwrap();
    adapter.set_exited(&handle, 137);
    assert!(!adapter.is_alive(&handle).await.unwrap());
    assert_eq!(adapter.exit_code(&handle).await.unwrap(), Some(137));
}

#[tokio::test]
async fn stop_unknown_handle_errors() {
    let adapter = FakeProcessAdapter::new();
    let err = adapter
        .stop(&ProcessHandle("ghost".into()), Duration::from_millis(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::NotFound(_)));
}
