// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events: the payloads written to the outbox and delivered to the
//! broker. Serializes as `{"type": "runner.started", ...fields}`, matching
//! the event envelope contract of spec.md §6.

use crate::project::ProjectName;
use crate::runner::RunnerId;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    #[serde(rename = "runner.started")]
    RunnerStarted {
        runner_id: RunnerId,
        project_name: ProjectName,
    },

    #[serde(rename = "runner.spawn_failed")]
    RunnerSpawnFailed {
        runner_id: RunnerId,
        project_name: ProjectName,
        error: String,
    },

    #[serde(rename = "runner.failed")]
    RunnerFailed {
        runner_id: RunnerId,
        project_name: ProjectName,
        reason: String,
    },

    #[serde(rename = "runner.terminated")]
    RunnerTerminated {
        runner_id: RunnerId,
        project_name: ProjectName,
        #[serde(default)]
        exit_code: Option<i32>,
    },

    #[serde(rename = "project.created")]
    ProjectCreated { project_name: ProjectName },

    #[serde(rename = "project.archived")]
    ProjectArchived { project_name: ProjectName },

    #[serde(rename = "session.started")]
    SessionStarted {
        session_id: SessionId,
        runner_id: RunnerId,
        project_name: ProjectName,
    },

    #[serde(rename = "session.ended")]
    SessionEnded {
        session_id: SessionId,
        project_name: ProjectName,
    },

    #[serde(rename = "budget.warning")]
    BudgetWarning {
        scope: String,
        scope_id: Option<String>,
        percent: u8,
        priority: String,
    },

    #[serde(rename = "daemon.started")]
    DaemonStarted,

    #[serde(rename = "daemon.stopped")]
    DaemonStopped,
}

impl DomainEvent {
    /// Machine-readable type tag, matching the serde rename above. Used to
    /// populate `outbox.event_type` without re-serializing the payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::RunnerStarted { .. } => "runner.started",
            DomainEvent::RunnerSpawnFailed { .. } => "runner.spawn_failed",
            DomainEvent::RunnerFailed { .. } => "runner.failed",
            DomainEvent::RunnerTerminated { .. } => "runner.terminated",
            DomainEvent::ProjectCreated { .. } => "project.created",
            DomainEvent::ProjectArchived { .. } => "project.archived",
            DomainEvent::SessionStarted { .. } => "session.started",
            DomainEvent::SessionEnded { .. } => "session.ended",
            DomainEvent::BudgetWarning { .. } => "budget.warning",
            DomainEvent::DaemonStarted => "daemon.started",
            DomainEvent::DaemonStopped => "daemon.stopped",
        }
    }

    /// Hierarchical routing key, e.g. `runner.started.<project>`, per
    /// spec.md §6. Events with no natural project scope route on the
    /// bare event type.
    pub fn routing_key(&self) -> String {
        match self {
            DomainEvent::RunnerStarted { project_name, .. }
            | DomainEvent::RunnerSpawnFailed { project_name, .. }
            | DomainEvent::RunnerFailed { project_name, .. }
            | DomainEvent::RunnerTerminated { project_name, .. }
            | DomainEvent::ProjectCreated { project_name }
            | DomainEvent::ProjectArchived { project_name }
            | DomainEvent::SessionStarted { project_name, .. }
            | DomainEvent::SessionEnded { project_name, .. } => {
                format!("{}.{}", self.event_type(), project_name)
            }
            DomainEvent::BudgetWarning { scope, .. } => {
                format!("{}.{}", self.event_type(), scope)
            }
            DomainEvent::DaemonStarted | DomainEvent::DaemonStopped => {
                self.event_type().to_string()
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
