// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn echo_config() -> ProcessSpawnConfig {
    ProcessSpawnConfig {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), "sleep 1".to_string()],
        env: Vec::new(),
        cwd: PathBuf::from("."),
    }
}

#[tokio::test]
async fn spawn_reports_alive_then_exit_code_after_stop() {
    let adapter = OsProcessAdapter::new();
    let (handle, pid) = adapter.spawn(echo_config()).await.unwrap();
    assert!(pid.is_some());
    assert!(adapter.is_alive(&handle).await.unwrap());

    let code = adapter.stop(&handle, Duration::from_secs(2)).await.unwrap();
    assert!(code.is_some());
}

#[tokio::test]
async fn spawn_rejects_missing_cwd() {
    let adapter = OsProcessAdapter::new();
    let mut cfg = echo_config();
    cfg.cwd = PathBuf::from("/no/such/directory");
    let err = adapter.spawn(cfg).await.unwrap_err();
    assert!(matches!(err, ProcessError::SpawnFailed(_)));
}

#[tokio::test]
async fn stop_unknown_handle_is_not_found() {
    let adapter = OsProcessAdapter::new();
    let err = adapter
        .stop(&ProcessHandle("ghost".into()), Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::NotFound(_)));
}

#[tokio::test]
async fn exit_code_is_none_while_running() {
    let adapter = OsProcessAdapter::new();
    let (handle, _) = adapter.spawn(echo_config()).await.unwrap();
    assert_eq!(adapter.exit_code(&handle).await.unwrap(), None);
    adapter.stop(&handle, Duration::from_secs(2)).await.unwrap();
}
