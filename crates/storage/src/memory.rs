// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `StateStore`, used by engine/api unit tests in place of
//! Postgres. Mirrors the Pg implementation's semantics (advisory-lock
//! equivalent via a per-project mutex, unique-constraint equivalent via a
//! manual existence check) so that engine tests exercise the same
//! invariants either backend would enforce.

use crate::{Result, StateStore, StorageError};
use async_trait::async_trait;
use oj_core::{
    BudgetScope, HeartbeatReport, OutboxEntry, OutboxId, PeriodGranularity, Project,
    ProjectName, ProjectStatus, ResourceQuota, Runner, RunnerId,
    RunnerLaunchRequest, RunnerResourceUsage, RunnerStatus, Session, SessionId, TokenBudget,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Inner {
    projects: HashMap<ProjectName, Project>,
    quotas: HashMap<ProjectName, ResourceQuota>,
    runners: HashMap<String, Runner>,
    sessions: HashMap<String, Session>,
    outbox: HashMap<String, OutboxEntry>,
    budgets: HashMap<(BudgetScope, Option<String>, i64), TokenBudget>,
}

/// Every project gets its own lock in this map, the in-memory equivalent of
/// the advisory lock `CreateRunnerTx` takes in the Pg implementation.
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
    project_locks: Mutex<HashMap<ProjectName, std::sync::Arc<Mutex<()>>>>,
    next_id: AtomicU64,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            project_locks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed a default unlimited quota for a project that was inserted
    /// without an explicit one (tests mostly don't care).
    pub fn with_quota(self, quota: ResourceQuota) -> Self {
        self.inner
            .lock()
            .quotas
            .insert(quota.project_name.clone(), quota);
        self
    }

    fn next_id_str(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }

    fn project_lock(&self, project_name: &str) -> std::sync::Arc<Mutex<()>> {
        self.project_locks
            .lock()
            .entry(project_name.to_string())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn create_project(&self, project: Project) -> Result<Project> {
        let mut inner = self.inner.lock();
        if inner.projects.contains_key(&project.name) {
            return Err(StorageError::AlreadyExists {
                kind: "project",
                id: project.name,
            });
        }
        inner.projects.insert(project.name.clone(), project.clone());
        Ok(project)
    }

    async fn get_project(&self, name: &str) -> Result<Project> {
        self.inner
            .lock()
            .projects
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "project",
                id: name.to_string(),
            })
    }

    async fn list_projects(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<Project>> {
        Ok(self
            .inner
            .lock()
            .projects
            .values()
            .filter(|p| status_filter.map(|s| p.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn archive_project(&self, name: &str, now_ms: i64) -> Result<Project> {
        let mut inner = self.inner.lock();
        let project = inner
            .projects
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound {
                kind: "project",
                id: name.to_string(),
            })?;
        project.archive(now_ms);
        Ok(project.clone())
    }

    async fn get_resource_quota(&self, project_name: &str) -> Result<ResourceQuota> {
        self.inner
            .lock()
            .quotas
            .get(project_name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "resource_quota",
                id: project_name.to_string(),
            })
    }

    async fn create_runner_tx(
        &self,
        request: RunnerLaunchRequest,
        quota_max: u32,
    ) -> Result<Runner> {
        // Serializes concurrent launches for this project only — the
        // in-memory analogue of `pg_advisory_xact_lock`.
        let lock = self.project_lock(&request.project_name);
        let _guard = lock.lock();

        let mut inner = self.inner.lock();
        if !inner.projects.contains_key(&request.project_name) {
            return Err(StorageError::NotFound {
                kind: "project",
                id: request.project_name,
            });
        }
        let active = inner
            .runners
            .values()
            .filter(|r| r.project_name == request.project_name && r.status.counts_toward_quota())
            .count();
        if active as u32 >= quota_max {
            return Err(StorageError::QuotaExceeded {
                reason: format!(
                    "project {} at capacity ({active}/{quota_max})",
                    request.project_name
                ),
            });
        }

        let id = RunnerId::new(self.next_id_str("r"));
        let runner = Runner {
            id: id.clone(),
            project_name: request.project_name,
            runtime: request.runtime,
            status: RunnerStatus::Starting,
            config: request.config,
            session_id: request.session_id,
            usage: RunnerResourceUsage::default(),
            restart_attempts: 0,
            max_restart_attempts: request.max_restart_attempts,
            started_at_ms: 0,
            last_heartbeat_ms: None,
            terminated_at_ms: None,
            heartbeat_ttl_seconds: request.heartbeat_ttl_seconds,
            exit_code: None,
        };
        inner.runners.insert(id.as_str().to_string(), runner.clone());

        let outbox_id = OutboxId::new(self.next_id_str("o"));
        let event_id = oj_core::EventId::new(self.next_id_str("e"));
        let ev = oj_core::DomainEvent::RunnerStarted {
            runner_id: runner.id.clone(),
            project_name: runner.project_name.clone(),
        };
        let entry = OutboxEntry::new(
            outbox_id.clone(),
            event_id,
            ev.event_type(),
            serde_json::to_value(&ev).map_err(|e| StorageError::Invariant(e.to_string()))?,
            ev.routing_key(),
            10,
            0,
        );
        inner.outbox.insert(outbox_id.as_str().to_string(), entry);

        Ok(runner)
    }

    async fn get_runner(&self, id: &str) -> Result<Runner> {
        self.inner
            .lock()
            .runners
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            })
    }

    async fn list_runners(&self, project_name: Option<&str>) -> Result<Vec<Runner>> {
        Ok(self
            .inner
            .lock()
            .runners
            .values()
            .filter(|r| project_name.map(|p| r.project_name == p).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn update_runner_runtime_id(&self, id: &RunnerId, runtime_pid: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        let runner = inner
            .runners
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            })?;
        runner.runtime = oj_core::RuntimeKind::Process {
            pid: Some(runtime_pid),
        };
        runner.status = RunnerStatus::Running;
        Ok(())
    }

    async fn update_runner_heartbeat(&self, hb: &HeartbeatReport, now_ms: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let runner = inner
            .runners
            .get_mut(hb.runner_id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "runner",
                id: hb.runner_id.to_string(),
            })?;
        runner.last_heartbeat_ms = Some(now_ms);
        runner.status = hb.status;
        runner.usage.cpu_percent = hb.cpu_percent;
        runner.usage.memory_mb = hb.memory_mb;
        runner.usage.tokens_used = hb.tokens_used;
        if hb.session_id.is_some() {
            runner.session_id.clone_from(&hb.session_id);
        }
        Ok(())
    }

    async fn terminate_runner(
        &self,
        id: &RunnerId,
        exit_code: Option<i32>,
        now_ms: i64,
    ) -> Result<Runner> {
        let mut inner = self.inner.lock();
        let runner = inner
            .runners
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            })?;
        runner.status = RunnerStatus::Terminated;
        runner.terminated_at_ms = Some(now_ms);
        runner.exit_code = exit_code;
        Ok(runner.clone())
    }

    async fn mark_runner_failed(&self, id: &RunnerId, now_ms: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let runner = inner
            .runners
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            })?;
        runner.status = RunnerStatus::Failed;
        runner.terminated_at_ms = Some(now_ms);
        Ok(())
    }

    async fn reconcile_stale_runners(
        &self,
        ttl_seconds_default: u64,
        now_ms: i64,
    ) -> Result<Vec<RunnerId>> {
        let mut inner = self.inner.lock();
        let mut failed = Vec::new();
        for runner in inner.runners.values_mut() {
            let ttl = if runner.heartbeat_ttl_seconds > 0 {
                runner.heartbeat_ttl_seconds
            } else {
                ttl_seconds_default
            };
            let stale = runner.status.counts_toward_quota()
                && runner
                    .last_heartbeat_ms
                    .map(|hb| now_ms - hb > ttl as i64 * 1000)
                    .unwrap_or(now_ms - runner.started_at_ms > ttl as i64 * 1000);
            if stale {
                runner.status = RunnerStatus::Failed;
                runner.terminated_at_ms = Some(now_ms);
                failed.push(runner.id.clone());
            }
        }
        Ok(failed)
    }

    async fn create_session(&self, session: Session) -> Result<Session> {
        let mut inner = self.inner.lock();
        inner
            .sessions
            .insert(session.id.as_str().to_string(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Session> {
        self.inner
            .lock()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            })
    }

    async fn list_sessions(&self, project_name: &str) -> Result<Vec<Session>> {
        Ok(self
            .inner
            .lock()
            .sessions
            .values()
            .filter(|s| s.project_name == project_name)
            .cloned()
            .collect())
    }

    async fn list_resumable_sessions(&self, project_name: &str) -> Result<Vec<Session>> {
        Ok(self
            .inner
            .lock()
            .sessions
            .values()
            .filter(|s| s.project_name == project_name && s.is_resumable())
            .cloned()
            .collect())
    }

    async fn record_session_message(&self, id: &SessionId, tokens: u64, now_ms: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            })?;
        session.record_message(tokens, now_ms);
        Ok(())
    }

    async fn end_session(&self, id: &SessionId, now_ms: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            })?;
        session.end(now_ms);
        Ok(())
    }

    async fn mark_session_non_resumable(&self, id: &SessionId) -> Result<()> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            })?;
        session.mark_non_resumable();
        Ok(())
    }

    async fn save_transcript_metadata(
        &self,
        id: &SessionId,
        storage_key: String,
        size_bytes: u64,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            })?;
        session.transcript.storage_key = Some(storage_key);
        session.transcript.size_bytes = Some(size_bytes);
        Ok(())
    }

    async fn record_event(
        &self,
        event: &oj_core::DomainEvent,
        max_attempts: u32,
        now_ms: i64,
    ) -> Result<OutboxEntry> {
        let mut inner = self.inner.lock();
        let outbox_id = OutboxId::new(self.next_id_str("o"));
        let event_id = oj_core::EventId::new(self.next_id_str("e"));
        let entry = OutboxEntry::new(
            outbox_id.clone(),
            event_id,
            event.event_type(),
            serde_json::to_value(event).map_err(|e| StorageError::Invariant(e.to_string()))?,
            event.routing_key(),
            max_attempts,
            now_ms,
        );
        inner.outbox.insert(outbox_id.as_str().to_string(), entry.clone());
        Ok(entry)
    }

    async fn get_pending_outbox_entries(&self, limit: i64, now_ms: i64) -> Result<Vec<OutboxEntry>> {
        let inner = self.inner.lock();
        let mut pending: Vec<OutboxEntry> = inner
            .outbox
            .values()
            .filter(|e| e.is_ready(now_ms))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn mark_outbox_delivered(&self, id: &OutboxId) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .outbox
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "outbox",
                id: id.to_string(),
            })?;
        entry.delivered = true;
        Ok(())
    }

    async fn increment_outbox_attempts(
        &self,
        id: &OutboxId,
        error_message: String,
        now_ms: i64,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .outbox
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                kind: "outbox",
                id: id.to_string(),
            })?;
        entry.attempts += 1;
        entry.last_error = Some(error_message);
        let delay = OutboxEntry::next_retry_delay_secs(entry.attempts);
        entry.next_retry_at_ms = Some(now_ms + delay * 1000);
        Ok(())
    }

    async fn get_token_budget(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        now_ms: i64,
    ) -> Result<Option<TokenBudget>> {
        let inner = self.inner.lock();
        Ok(inner
            .budgets
            .values()
            .find(|b| {
                b.scope == scope
                    && b.scope_id.as_deref() == scope_id
                    && b.is_active(now_ms)
            })
            .cloned())
    }

    async fn increment_token_usage(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        tokens: u64,
        now_ms: i64,
    ) -> Result<TokenBudget> {
        let mut inner = self.inner.lock();
        let budget = inner
            .budgets
            .values_mut()
            .find(|b| b.scope == scope && b.scope_id.as_deref() == scope_id && b.is_active(now_ms))
            .ok_or_else(|| StorageError::NotFound {
                kind: "token_budget",
                id: scope_id.unwrap_or("global").to_string(),
            })?;
        budget.record_usage(tokens);
        Ok(budget.clone())
    }

    async fn get_expired_budgets(&self, now_ms: i64) -> Result<Vec<TokenBudget>> {
        Ok(self
            .inner
            .lock()
            .budgets
            .values()
            .filter(|b| !b.is_active(now_ms))
            .cloned()
            .collect())
    }

    async fn create_budget_period(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        limit_tokens: u64,
        granularity: PeriodGranularity,
        period_start_ms: i64,
    ) -> Result<TokenBudget> {
        let mut inner = self.inner.lock();
        let key = (scope, scope_id.map(str::to_string), period_start_ms);
        if let Some(existing) = inner.budgets.get(&key) {
            return Ok(existing.clone());
        }
        let budget = TokenBudget::new(
            scope,
            scope_id.map(str::to_string),
            limit_tokens,
            granularity,
            period_start_ms,
        );
        inner.budgets.insert(key, budget.clone());
        Ok(budget)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
