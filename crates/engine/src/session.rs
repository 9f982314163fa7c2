// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session tracker (spec.md §4.5): conversation contexts that can outlive
//! a single runner, plus the resume decision.

use crate::error::Result;
use oj_core::{Clock, RunnerId, RunnerStatus, Session, SessionId};
use oj_storage::StateStore;
use std::sync::Arc;

/// Outcome of a resume request: whether the client should attach to the
/// still-running original runner or spin up a new one carrying `session_id`
/// forward (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeDecision {
    pub session: Session,
    pub runner_active: bool,
    pub needs_new_runner: bool,
}

pub struct SessionTracker<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S, C> SessionTracker<S, C>
where
    S: StateStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, id: SessionId, runner_id: RunnerId, project_name: &str, resumed_from: Option<SessionId>) -> Result<Session> {
        let now_ms = self.clock.now_ms();
        let session = Session::new(id, runner_id, project_name, now_ms, resumed_from);
        Ok(self.store.create_session(session).await?)
    }

    pub async fn record_message(&self, id: &SessionId, tokens: u64) -> Result<()> {
        let now_ms = self.clock.now_ms();
        self.store.record_session_message(id, tokens, now_ms).await?;
        Ok(())
    }

    pub async fn end(&self, id: &SessionId) -> Result<()> {
        let now_ms = self.clock.now_ms();
        self.store.end_session(id, now_ms).await?;
        Ok(())
    }

    /// `Resume`: look up the session, then decide whether the original
    /// runner can still be attached to or whether a fresh one needs to
    /// carry `session_id` forward.
    pub async fn resume(&self, id: &SessionId) -> Result<ResumeDecision> {
        let session = self.store.get_session(id.as_str()).await?;
        if !session.is_resumable() {
            return Ok(ResumeDecision { session, runner_active: false, needs_new_runner: false });
        }
        let runner_active = match self.store.get_runner(session.runner_id.as_str()).await {
            Ok(runner) => runner.status == RunnerStatus::Running,
            Err(_) => false,
        };
        Ok(ResumeDecision {
            needs_new_runner: !runner_active,
            runner_active,
            session,
        })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
