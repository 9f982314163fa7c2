// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProcessAdapter, ProcessError, ProcessHandle, ProcessSpawnConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Recorded process call
#[derive(Debug, Clone)]
pub enum ProcessCall {
    Spawn { command: String, args: Vec<String> },
    Stop { handle: String },
    IsAlive { handle: String },
}

struct FakeProcess {
    alive: bool,
    exit_code: Option<i32>,
}

struct FakeProcessState {
    processes: HashMap<String, FakeProcess>,
    calls: Vec<ProcessCall>,
    next_id: u64,
    fail_next_spawn: bool,
}

/// Fake process adapter for testing the supervisor without spawning real OS processes.
#[derive(Clone)]
pub struct FakeProcessAdapter {
    inner: Arc<Mutex<FakeProcessState>>,
}

impl Default for FakeProcessAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProcessState {
                processes: HashMap::new(),
                calls: Vec::new(),
                next_id: 0,
                fail_next_spawn: false,
            })),
        }
    }
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ProcessCall> {
        self.inner.lock().calls.clone()
    }

    pub fn fail_next_spawn(&self) {
        self.inner.lock().fail_next_spawn = true;
    }

    /// Simulate the process having exited on its own (crash), as observed by `is_alive`.
    pub fn set_exited(&self, handle: &ProcessHandle, exit_code: i32) {
        if let Some(p) = self.inner.lock().processes.get_mut(handle.as_str()) {
            p.alive = false;
            p.exit_code = Some(exit_code);
        }
    }
}

#[async_trait]
impl ProcessAdapter for FakeProcessAdapter {
    async fn spawn(
        &self,
        config: ProcessSpawnConfig,
    ) -> Result<(ProcessHandle, Option<u32>), ProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProcessCall::Spawn {
            command: config.command.clone(),
            args: config.args.clone(),
        });

        if inner.fail_next_spawn {
            inner.fail_next_spawn = false;
            return Err(ProcessError::SpawnFailed("simulated spawn failure".into()));
        }

        inner.next_id += 1;
        let id = format!("fake-proc-{}", inner.next_id);
        inner.processes.insert(
            id.clone(),
            FakeProcess {
                alive: true,
                exit_code: None,
            },
        );
        Ok((ProcessHandle(id), Some(1000 + inner.next_id as u32)))
    }

    async fn stop(&self, handle: &ProcessHandle, _grace: Duration) -> Result<Option<i32>, ProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProcessCall::Stop {
            handle: handle.0.clone(),
        });
        match inner.processes.get_mut(handle.as_str()) {
            Some(p) => {
                p.alive = false;
                if p.exit_code.is_none() {
                    p.exit_code = Some(0);
                }
                Ok(p.exit_code)
            }
            None => Err(ProcessError::NotFound(handle.0.clone())),
        }
    }

    async fn is_alive(&self, handle: &ProcessHandle) -> Result<bool, ProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProcessCall::IsAlive {
            handle: handle.0.clone(),
        });
        match inner.processes.get(handle.as_str()) {
            Some(p) => Ok(p.alive),
            None => Err(ProcessError::NotFound(handle.0.clone())),
        }
    }

    async fn exit_code(&self, handle: &ProcessHandle) -> Result<Option<i32>, ProcessError> {
        let inner = self.inner.lock();
        match inner.processes.get(handle.as_str()) {
            Some(p) => Ok(p.exit_code),
            None => Err(ProcessError::NotFound(handle.0.clone())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
