// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process adapters
//!
//! Spawns and supervises runner child processes. The `ProcessAdapter` trait
//! encapsulates the OS-process boundary so the supervisor never touches
//! `std::process` directly: spawn, stop (graceful then forced), liveness,
//! and exit code retrieval.

mod real;

pub use real::OsProcessAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcessAdapter, ProcessCall};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("signal failed: {0}")]
    SignalFailed(String),
}

/// Everything needed to spawn a runner's child process.
#[derive(Debug, Clone)]
pub struct ProcessSpawnConfig {
    /// Command to execute (the runner's configured executable).
    pub command: String,
    /// Arguments, always including the identity args per spec.md §6
    /// (runner id, project name, project path, forwarded flags).
    pub args: Vec<String>,
    /// Environment variables forwarded from the launch request.
    pub env: Vec<(String, String)>,
    /// Working directory; must exist.
    pub cwd: PathBuf,
}

/// Handle returned on spawn, opaque outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessHandle(pub String);

impl ProcessHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Adapter for spawning and supervising runner child processes.
#[async_trait]
pub trait ProcessAdapter: Clone + Send + Sync + 'static {
    /// Spawn a child process, returning a handle used for all subsequent
    /// calls. The OS pid, if available immediately, is also returned so the
    /// caller can persist it via `UpdateRunnerRuntimeID`.
    async fn spawn(&self, config: ProcessSpawnConfig) -> Result<(ProcessHandle, Option<u32>), ProcessError>;

    /// Send a terminate signal and wait up to `grace` for exit; force-kill
    /// past the deadline. Returns the observed exit code, if any.
    async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> Result<Option<i32>, ProcessError>;

    /// Non-blocking liveness check.
    async fn is_alive(&self, handle: &ProcessHandle) -> Result<bool, ProcessError>;

    /// Exit code once the process has exited; `None` while still running.
    async fn exit_code(&self, handle: &ProcessHandle) -> Result<Option<i32>, ProcessError>;
}

pub(crate) fn env_map(env: &[(String, String)]) -> HashMap<String, String> {
    env.iter().cloned().collect()
}

pub(crate) fn validate_cwd(cwd: &Path) -> Result<(), ProcessError> {
    if !cwd.exists() {
        return Err(ProcessError::SpawnFailed(format!(
            "working directory does not exist: {}",
            cwd.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
