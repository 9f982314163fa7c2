// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner: a supervised child process performing the user-facing work.

use crate::project::ProjectName;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

crate::define_id! {
    /// Unique identifier for a runner instance.
    pub struct RunnerId;
}

/// The runtime branch a runner executes under. Only `Process` is
/// implemented by the supervisor; `Container` and `Remote` exist so that
/// extending spawn/stop to those branches doesn't require an enum
/// migration later (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeKind {
    Process {
        #[serde(default)]
        pid: Option<u32>,
    },
    Container {
        #[serde(default)]
        container_id: Option<String>,
    },
    Remote {
        #[serde(default)]
        handle: Option<String>,
    },
}

impl RuntimeKind {
    pub fn new_process() -> Self {
        RuntimeKind::Process { pid: None }
    }

    pub fn runtime_id(&self) -> Option<String> {
        match self {
            RuntimeKind::Process { pid } => pid.map(|p| p.to_string()),
            RuntimeKind::Container { container_id } => container_id.clone(),
            RuntimeKind::Remote { handle } => handle.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Starting,
    Running,
    Paused,
    Terminated,
    Failed,
}

impl RunnerStatus {
    /// `true` for the two statuses counted against the project's
    /// concurrency quota.
    pub fn counts_toward_quota(&self) -> bool {
        matches!(self, RunnerStatus::Starting | RunnerStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerStatus::Terminated | RunnerStatus::Failed)
    }
}

/// Launch-time configuration for a runner, persisted as one JSON column so
/// the facade and domain type never diverge (see spec.md §9 rough edge).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunnerResourceUsage {
    pub tokens_used: u64,
    pub cpu_percent: f32,
    pub memory_mb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    pub id: RunnerId,
    pub project_name: ProjectName,
    pub runtime: RuntimeKind,
    pub status: RunnerStatus,
    pub config: RunnerConfig,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub usage: RunnerResourceUsage,
    #[serde(default)]
    pub restart_attempts: u32,
    pub max_restart_attempts: u32,
    pub started_at_ms: i64,
    #[serde(default)]
    pub last_heartbeat_ms: Option<i64>,
    #[serde(default)]
    pub terminated_at_ms: Option<i64>,
    pub heartbeat_ttl_seconds: u64,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Input to `StateStore::create_runner_tx`. Carries everything the launch
/// transaction needs to decide starting/quota-exceeded/not-found without a
/// round trip back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerLaunchRequest {
    pub project_name: ProjectName,
    pub runtime: RuntimeKind,
    pub config: RunnerConfig,
    pub max_restart_attempts: u32,
    pub heartbeat_ttl_seconds: u64,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// A single heartbeat report from a runner, as received at the API facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatReport {
    pub runner_id: RunnerId,
    pub status: RunnerStatus,
    pub cpu_percent: f32,
    pub memory_mb: u32,
    pub tokens_used: u64,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl Runner {
    /// A runner whose last heartbeat predates `now_ms - heartbeat_ttl_seconds`
    /// while still in `{starting, running}` is stale per spec.md §3.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        if !self.status.counts_toward_quota() {
            return false;
        }
        match self.last_heartbeat_ms {
            Some(hb) => {
                let ttl_ms = self.heartbeat_ttl_seconds as i64 * 1000;
                now_ms - hb > ttl_ms
            }
            // Never heartbeated yet: staleness is judged from started_at.
            None => {
                let ttl_ms = self.heartbeat_ttl_seconds as i64 * 1000;
                now_ms - self.started_at_ms > ttl_ms
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
