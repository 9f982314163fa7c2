// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::process::FakeProcessAdapter;
use serial_test::{parallel, serial};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn assert_log(logs: &str, label: &str, expected: &str) {
    assert!(logs.contains(expected), "Should log {label}. Logs:\n{logs}",);
}

fn cfg() -> ProcessSpawnConfig {
    ProcessSpawnConfig {
        command: "runner-bin".to_string(),
        args: vec![],
        env: vec![],
        cwd: PathBuf::from("."),
    }
}

async fn spawn_traced_process() -> (FakeProcessAdapter, TracedProcess<FakeProcessAdapter>, ProcessHandle) {
    let fake = FakeProcessAdapter::new();
    let traced = TracedProcess::new(fake.clone());
    let (handle, _) = traced.spawn(cfg()).await.unwrap();
    (fake, traced, handle)
}

#[test]
#[serial(tracing)]
fn traced_process_spawn_logs_entry_and_completion() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeProcessAdapter::new();
        let traced = TracedProcess::new(fake);
        traced.spawn(cfg()).await
    });

    assert!(result.is_ok(), "spawn should succeed: {:?}", result);
    assert_log(&logs, "span name", "process.spawn");
    assert_log(&logs, "entry message", "starting");
    assert_log(&logs, "completion", "process spawned");
    assert_log(&logs, "timing", "elapsed_ms");
}

#[test]
#[serial(tracing)]
fn traced_process_spawn_logs_error_on_failure() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeProcessAdapter::new();
        fake.fail_next_spawn();
        let traced = TracedProcess::new(fake);
        traced.spawn(cfg()).await
    });

    assert!(result.is_err());
    assert_log(&logs, "spawn failure", "spawn failed");
}

#[test]
#[serial(tracing)]
fn traced_process_stop_logs_operation() {
    let (logs, _) = with_tracing(|| async {
        let (_, traced, handle) = spawn_traced_process().await;
        traced.stop(&handle, Duration::from_millis(10)).await
    });

    assert_log(&logs, "stop span", "process.stop");
    assert_log(&logs, "stop completion", "stopped");
}

#[tokio::test]
#[parallel(tracing)]
async fn traced_process_delegates_spawn_to_inner() {
    let fake = FakeProcessAdapter::new();
    let traced = TracedProcess::new(fake.clone());

    let (handle, _) = traced.spawn(cfg()).await.unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        crate::process::ProcessCall::Spawn { command, .. } => {
            assert_eq!(command, "runner-bin");
        }
        other => panic!("Expected Spawn call, got {:?}", other),
    }

    assert!(fake.is_alive(&handle).await.unwrap());
}

#[tokio::test]
#[parallel(tracing)]
async fn traced_process_is_alive_delegates_to_inner() {
    let (fake, traced, handle) = spawn_traced_process().await;

    assert!(traced.is_alive(&handle).await.unwrap());
    fake.set_exited(&handle, 0);
    assert!(!traced.is_alive(&handle).await.unwrap());
}

#[tokio::test]
#[parallel(tracing)]
async fn traced_process_exit_code_delegates_to_inner() {
    let (fake, traced, handle) = spawn_traced_process().await;
    assert_eq!(traced.exit_code(&handle).await.unwrap(), None);
    fake.set_exited(&handle, 42);
    assert_eq!(traced.exit_code(&handle).await.unwrap(), Some(42));
}
