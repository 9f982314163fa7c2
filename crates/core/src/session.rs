// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session: a conversation context that can outlive a single runner.

use crate::project::ProjectName;
use crate::runner::RunnerId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a conversation session.
    pub struct SessionId;
}

/// Transcript blob reference. The core never touches transcript bytes, only
/// the key and size an external object store hands back (spec.md §6).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRef {
    #[serde(default)]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub runner_id: RunnerId,
    pub project_name: ProjectName,
    pub started_at_ms: i64,
    #[serde(default)]
    pub ended_at_ms: Option<i64>,
    #[serde(default)]
    pub last_message_at_ms: Option<i64>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub tokens_used: u64,
    pub resumable: bool,
    #[serde(default)]
    pub resumed_from: Option<SessionId>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub transcript: TranscriptRef,
}

impl Session {
    pub fn new(
        id: SessionId,
        runner_id: RunnerId,
        project_name: impl Into<String>,
        now_ms: i64,
        resumed_from: Option<SessionId>,
    ) -> Self {
        Self {
            id,
            runner_id,
            project_name: project_name.into(),
            started_at_ms: now_ms,
            ended_at_ms: None,
            last_message_at_ms: None,
            message_count: 0,
            tokens_used: 0,
            resumable: true,
            resumed_from,
            summary: None,
            transcript: TranscriptRef::default(),
        }
    }

    /// A session is a candidate for resumption iff it is still marked
    /// resumable and has not ended (spec.md §3 invariant).
    pub fn is_resumable(&self) -> bool {
        self.resumable && self.ended_at_ms.is_none()
    }

    pub fn record_message(&mut self, tokens: u64, now_ms: i64) {
        self.message_count += 1;
        self.tokens_used += tokens;
        self.last_message_at_ms = Some(now_ms);
    }

    pub fn end(&mut self, now_ms: i64) {
        self.ended_at_ms = Some(now_ms);
    }

    pub fn mark_non_resumable(&mut self) {
        self.resumable = false;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
