// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS-process-backed `ProcessAdapter`.

use super::{env_map, validate_cwd, ProcessAdapter, ProcessError, ProcessHandle, ProcessSpawnConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Spawns and supervises runner processes directly via `tokio::process`.
#[derive(Clone)]
pub struct OsProcessAdapter {
    children: Arc<Mutex<HashMap<String, Child>>>,
    exit_codes: Arc<Mutex<HashMap<String, Option<i32>>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for OsProcessAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OsProcessAdapter {
    pub fn new() -> Self {
        Self {
            children: Arc::new(Mutex::new(HashMap::new())),
            exit_codes: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

#[async_trait]
impl ProcessAdapter for OsProcessAdapter {
    async fn spawn(
        &self,
        config: ProcessSpawnConfig,
    ) -> Result<(ProcessHandle, Option<u32>), ProcessError> {
        validate_cwd(&config.cwd)?;

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args).current_dir(&config.cwd);
        for (k, v) in env_map(&config.env) {
            cmd.env(k, v);
        }
        cmd.kill_on_drop(false);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(e.to_string()))?;
        let pid = child.id();

        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ProcessHandle(format!("proc-{n}"));
        self.children.lock().await.insert(handle.0.clone(), child);

        Ok((handle, pid))
    }

    async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> Result<Option<i32>, ProcessError> {
        let mut children = self.children.lock().await;
        let child = children
            .get_mut(handle.as_str())
            .ok_or_else(|| ProcessError::NotFound(handle.0.clone()))?;

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        let exit = tokio::time::timeout(grace, child.wait()).await;
        let status = match exit {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(ProcessError::SignalFailed(e.to_string())),
            Err(_elapsed) => {
                child
                    .kill()
                    .await
                    .map_err(|e| ProcessError::SignalFailed(e.to_string()))?;
                child
                    .wait()
                    .await
                    .map_err(|e| ProcessError::SignalFailed(e.to_string()))?
            }
        };

        let code = status.code();
        children.remove(handle.as_str());
        self.exit_codes
            .lock()
            .await
            .insert(handle.0.clone(), code);
        Ok(code)
    }

    async fn is_alive(&self, handle: &ProcessHandle) -> Result<bool, ProcessError> {
        let mut children = self.children.lock().await;
        let child = children
            .get_mut(handle.as_str())
            .ok_or_else(|| ProcessError::NotFound(handle.0.clone()))?;
        match child.try_wait() {
            Ok(Some(status)) => {
                let code = status.code();
                drop(children);
                self.exit_codes.lock().await.insert(handle.0.clone(), code);
                Ok(false)
            }
            Ok(None) => Ok(true),
            Err(e) => Err(ProcessError::SignalFailed(e.to_string())),
        }
    }

    async fn exit_code(&self, handle: &ProcessHandle) -> Result<Option<i32>, ProcessError> {
        if let Some(code) = self.exit_codes.lock().await.get(handle.as_str()) {
            return Ok(*code);
        }
        let mut children = self.children.lock().await;
        match children.get_mut(handle.as_str()) {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => Ok(status.code()),
                Ok(None) => Ok(None),
                Err(e) => Err(ProcessError::SignalFailed(e.to_string())),
            },
            None => Err(ProcessError::NotFound(handle.0.clone())),
        }
    }
}

#[cfg(test)]
#[path = "real_tests.rs"]
mod tests;
