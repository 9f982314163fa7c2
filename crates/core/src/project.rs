// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project: the unit of grouping for runners, quotas, and counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A project's name is also its primary key; there is no separate surrogate
/// ID because the state store's `CreateProject` already fails with
/// `AlreadyExists` on a duplicate name.
pub type ProjectName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Idle,
    Archived,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Idle
    }
}

/// Counters maintained by the runner create/terminate paths, never written
/// directly by API callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCounters {
    pub total_runners: u64,
    pub active_runners: u64,
    pub total_sessions: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: ProjectName,
    pub path: PathBuf,
    pub status: ProjectStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub counters: ProjectCounters,
    pub created_at_ms: i64,
    #[serde(default)]
    pub last_accessed_at_ms: Option<i64>,
    #[serde(default)]
    pub archived_at_ms: Option<i64>,
    pub updated_at_ms: i64,
}

impl Project {
    /// Construct a new project as it exists immediately after `CreateProject`:
    /// status `idle`, empty counters, no access/archive timestamps yet.
    pub fn new(name: impl Into<String>, path: PathBuf, now_ms: i64) -> Self {
        Self {
            name: name.into(),
            path,
            status: ProjectStatus::Idle,
            description: None,
            tags: BTreeSet::new(),
            counters: ProjectCounters::default(),
            created_at_ms: now_ms,
            last_accessed_at_ms: None,
            archived_at_ms: None,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == ProjectStatus::Archived
    }

    pub fn touch_accessed(&mut self, now_ms: i64) {
        self.last_accessed_at_ms = Some(now_ms);
        self.updated_at_ms = now_ms;
    }

    pub fn archive(&mut self, now_ms: i64) {
        self.status = ProjectStatus::Archived;
        self.archived_at_ms = Some(now_ms);
        self.updated_at_ms = now_ms;
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
