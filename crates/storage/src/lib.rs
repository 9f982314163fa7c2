// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer: the sole persistent source of truth. Exposes typed,
//! transactional operations through the [`StateStore`] trait and nothing
//! else — callers never see a connection, a row, or a SQL string.

mod error;
mod memory;
#[cfg(feature = "postgres")]
mod pg;

pub use error::{Result, StorageError};
pub use memory::MemoryStateStore;
#[cfg(feature = "postgres")]
pub use pg::PgStateStore;

use async_trait::async_trait;
use oj_core::{
    DomainEvent, OutboxEntry, OutboxId, Project, ProjectName, ProjectStatus, Runner, RunnerId,
    RunnerLaunchRequest, Session, SessionId, TokenBudget, PeriodGranularity,
    BudgetScope, HeartbeatReport, ResourceQuota,
};

/// The sole persistent source of truth for the daemon. Every method runs in
/// a bounded connection pool with timeouts; a `StorageError::Database`
/// (`ErrorKind::Transient`) bubbles up unchanged for the caller to retry.
#[async_trait]
pub trait StateStore: Send + Sync {
    // -- projects --

    async fn create_project(&self, project: Project) -> Result<Project>;
    async fn get_project(&self, name: &str) -> Result<Project>;
    async fn list_projects(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<Project>>;
    async fn archive_project(&self, name: &str, now_ms: i64) -> Result<Project>;
    async fn get_resource_quota(&self, project_name: &str) -> Result<ResourceQuota>;

    // -- runners --

    /// One atomic transaction: advisory-locks the project, counts runners in
    /// {starting, running}, inserts the Runner row if under quota, and
    /// inserts a matching `runner.started` outbox row. See spec §4.1.
    async fn create_runner_tx(
        &self,
        request: RunnerLaunchRequest,
        quota_max: u32,
    ) -> Result<Runner>;

    async fn get_runner(&self, id: &str) -> Result<Runner>;
    async fn list_runners(&self, project_name: Option<&str>) -> Result<Vec<Runner>>;
    async fn update_runner_runtime_id(&self, id: &RunnerId, runtime_pid: u32) -> Result<()>;
    async fn update_runner_heartbeat(&self, hb: &HeartbeatReport, now_ms: i64) -> Result<()>;
    async fn terminate_runner(&self, id: &RunnerId, exit_code: Option<i32>, now_ms: i64) -> Result<Runner>;
    async fn mark_runner_failed(&self, id: &RunnerId, now_ms: i64) -> Result<()>;

    /// Single server-side statement: flips every stale live runner to
    /// `failed` and returns the affected ids. Idempotent — a second call
    /// with no new heartbeats returns an empty list.
    async fn reconcile_stale_runners(&self, ttl_seconds_default: u64, now_ms: i64) -> Result<Vec<RunnerId>>;

    // -- sessions --

    async fn create_session(&self, session: Session) -> Result<Session>;
    async fn get_session(&self, id: &str) -> Result<Session>;
    async fn list_sessions(&self, project_name: &str) -> Result<Vec<Session>>;
    async fn list_resumable_sessions(&self, project_name: &str) -> Result<Vec<Session>>;
    async fn record_session_message(&self, id: &SessionId, tokens: u64, now_ms: i64) -> Result<()>;
    async fn end_session(&self, id: &SessionId, now_ms: i64) -> Result<()>;
    async fn mark_session_non_resumable(&self, id: &SessionId) -> Result<()>;
    async fn save_transcript_metadata(&self, id: &SessionId, storage_key: String, size_bytes: u64) -> Result<()>;

    // -- outbox --

    /// Append a domain event to the outbox for delivery, outside of
    /// `create_runner_tx`'s bundled insert (e.g. `runner.terminated`,
    /// `session.started`, `budget.warning`). `max_attempts` bounds the
    /// publisher's retry count before the entry is left stuck (spec.md
    /// §4.3 step 1).
    async fn record_event(
        &self,
        event: &DomainEvent,
        max_attempts: u32,
        now_ms: i64,
    ) -> Result<OutboxEntry>;

    async fn get_pending_outbox_entries(&self, limit: i64, now_ms: i64) -> Result<Vec<OutboxEntry>>;
    async fn mark_outbox_delivered(&self, id: &OutboxId) -> Result<()>;
    async fn increment_outbox_attempts(&self, id: &OutboxId, error_message: String, now_ms: i64) -> Result<()>;

    // -- budgets --

    async fn get_token_budget(&self, scope: BudgetScope, scope_id: Option<&str>, now_ms: i64) -> Result<Option<TokenBudget>>;
    async fn increment_token_usage(&self, scope: BudgetScope, scope_id: Option<&str>, tokens: u64, now_ms: i64) -> Result<TokenBudget>;
    async fn get_expired_budgets(&self, now_ms: i64) -> Result<Vec<TokenBudget>>;
    async fn create_budget_period(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        limit_tokens: u64,
        granularity: PeriodGranularity,
        period_start_ms: i64,
    ) -> Result<TokenBudget>;
}
