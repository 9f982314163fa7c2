// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response shapes for the facade (spec.md §4.6). Responses reuse
//! the domain types from `oj-core` directly rather than duplicating their
//! fields (spec.md §9: "implementations should not maintain two copies").

use oj_core::{ProjectStatus, RunnerConfig, RuntimeKind, Session};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// `LaunchRunner` omits an explicit heartbeat TTL in most calls; this is
/// the daemon-wide default applied when the caller doesn't override it.
pub const DEFAULT_HEARTBEAT_TTL_SECONDS: u64 = 30;
pub const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 3;

fn default_heartbeat_ttl() -> u64 {
    DEFAULT_HEARTBEAT_TTL_SECONDS
}

fn default_max_restart_attempts() -> u32 {
    DEFAULT_MAX_RESTART_ATTEMPTS
}

#[derive(Debug, Deserialize)]
pub struct LaunchRunnerRequest {
    pub project: String,
    pub path: PathBuf,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Free-form, forwarded to the runner process but not persisted on the
    /// domain `Runner` (spec.md §4.6 lists it as a launch parameter; no
    /// corresponding data-model field exists for it in spec.md §3).
    #[serde(default)]
    pub conversation_mode: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub runtime_type: RuntimeTypeDto,
    #[serde(default = "default_heartbeat_ttl")]
    pub heartbeat_ttl_seconds: u64,
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeTypeDto {
    #[default]
    Process,
    Container,
    Remote,
}

impl RuntimeTypeDto {
    pub fn into_runtime_kind(self) -> RuntimeKind {
        match self {
            RuntimeTypeDto::Process => RuntimeKind::new_process(),
            RuntimeTypeDto::Container => RuntimeKind::Container { container_id: None },
            RuntimeTypeDto::Remote => RuntimeKind::Remote { handle: None },
        }
    }
}

impl LaunchRunnerRequest {
    pub fn into_config(&self) -> RunnerConfig {
        RunnerConfig {
            flags: self.flags.clone(),
            capabilities: self.capabilities.clone(),
            env: self.env.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StopRunnerRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ListRunnersQuery {
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub status: oj_core::RunnerStatus,
    pub cpu_percent: f32,
    pub memory_mb: u32,
    pub tokens_used: u64,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// `SendHeartbeat` never returns a hard error for an unknown runner;
/// `success=false` tells the agent to stop sending (spec.md §4.6).
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub metrics: oj_engine::metrics::MetricsSnapshot,
    pub active_runners: usize,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub stale_evicted: usize,
    pub budgets_rolled: usize,
}

/// `ResumeSession` wire shape. `oj_engine::ResumeDecision` isn't `Serialize`
/// itself (it's an internal engine type); this flattens it rather than
/// adding a serde dependency to a crate that otherwise has no wire concerns.
#[derive(Debug, Serialize)]
pub struct ResumeSessionResponse {
    pub session: Session,
    pub runner_active: bool,
    pub needs_new_runner: bool,
}

impl From<oj_engine::ResumeDecision> for ResumeSessionResponse {
    fn from(d: oj_engine::ResumeDecision) -> Self {
        Self {
            session: d.session,
            runner_active: d.runner_active,
            needs_new_runner: d.needs_new_runner,
        }
    }
}
