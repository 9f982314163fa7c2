// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object-safe facades over the generic `oj-engine` components, so
//! `AppState` can hold `Arc<dyn ...>` instead of threading the process/
//! broker/notify/clock type parameters through every handler signature.
//! `oj-daemon` picks the concrete adapters; this crate only ever sees the
//! trait objects.

use async_trait::async_trait;
use oj_core::{BudgetScope, HeartbeatReport, Runner, RunnerId, RunnerLaunchRequest, Session, SessionId};
use oj_engine::{BudgetEnforcer, EngineError, Reconciler, ResumeDecision, Supervisor};
use oj_adapters::{NotifyAdapter, ProcessAdapter};
use oj_storage::StateStore;
use std::path::PathBuf;

pub type FacadeResult<T> = Result<T, EngineError>;

#[async_trait]
pub trait RunnerFacade: Send + Sync {
    async fn launch(
        &self,
        request: RunnerLaunchRequest,
        quota_max: u32,
        command: String,
        project_path: PathBuf,
        cwd: PathBuf,
    ) -> FacadeResult<Runner>;

    async fn stop(&self, id: &RunnerId, force: bool) -> FacadeResult<Runner>;
    async fn heartbeat(&self, hb: HeartbeatReport) -> FacadeResult<()>;
    fn is_managed(&self, id: &RunnerId) -> bool;
}

#[async_trait]
impl<P, S, C> RunnerFacade for Supervisor<P, S, C>
where
    P: ProcessAdapter,
    S: StateStore,
    C: oj_core::Clock,
{
    async fn launch(
        &self,
        request: RunnerLaunchRequest,
        quota_max: u32,
        command: String,
        project_path: PathBuf,
        cwd: PathBuf,
    ) -> FacadeResult<Runner> {
        Supervisor::launch(self, request, quota_max, command, project_path, cwd).await
    }

    async fn stop(&self, id: &RunnerId, force: bool) -> FacadeResult<Runner> {
        Supervisor::stop_runner(self, id, force).await
    }

    async fn heartbeat(&self, hb: HeartbeatReport) -> FacadeResult<()> {
        Supervisor::process_heartbeat(self, hb).await
    }

    fn is_managed(&self, id: &RunnerId) -> bool {
        Supervisor::is_managed(self, id)
    }
}

#[async_trait]
pub trait BudgetFacade: Send + Sync {
    async fn check_budget(&self, project_name: &str, estimated_tokens: u64) -> FacadeResult<()>;
    async fn record_usage(&self, scope: BudgetScope, scope_id: Option<&str>, tokens: u64) -> FacadeResult<()>;
}

#[async_trait]
impl<S, N, C> BudgetFacade for BudgetEnforcer<S, N, C>
where
    S: StateStore,
    N: NotifyAdapter,
    C: oj_core::Clock,
{
    async fn check_budget(&self, project_name: &str, estimated_tokens: u64) -> FacadeResult<()> {
        BudgetEnforcer::check_budget(self, project_name, estimated_tokens).await
    }

    async fn record_usage(&self, scope: BudgetScope, scope_id: Option<&str>, tokens: u64) -> FacadeResult<()> {
        BudgetEnforcer::record_usage(self, scope, scope_id, tokens).await
    }
}

#[async_trait]
pub trait SessionFacade: Send + Sync {
    async fn create(&self, id: SessionId, runner_id: RunnerId, project_name: &str, resumed_from: Option<SessionId>) -> FacadeResult<Session>;
    async fn resume(&self, id: &SessionId) -> FacadeResult<ResumeDecision>;
    async fn end(&self, id: &SessionId) -> FacadeResult<()>;
}

#[async_trait]
impl<S, C> SessionFacade for oj_engine::SessionTracker<S, C>
where
    S: StateStore,
    C: oj_core::Clock,
{
    async fn create(&self, id: SessionId, runner_id: RunnerId, project_name: &str, resumed_from: Option<SessionId>) -> FacadeResult<Session> {
        oj_engine::SessionTracker::create(self, id, runner_id, project_name, resumed_from).await
    }

    async fn resume(&self, id: &SessionId) -> FacadeResult<ResumeDecision> {
        oj_engine::SessionTracker::resume(self, id).await
    }

    async fn end(&self, id: &SessionId) -> FacadeResult<()> {
        oj_engine::SessionTracker::end(self, id).await
    }
}

#[async_trait]
pub trait ReconcileFacade: Send + Sync {
    /// `TriggerReconciliation`: run one sweep immediately instead of
    /// waiting for the next scheduled tick. Returns `(stale_evicted,
    /// budgets_rolled)`.
    async fn trigger(&self) -> (usize, usize);
}

#[async_trait]
impl<P, S, C, N> ReconcileFacade for Reconciler<P, S, C, N>
where
    P: ProcessAdapter,
    S: StateStore,
    C: oj_core::Clock,
    N: NotifyAdapter,
{
    async fn trigger(&self) -> (usize, usize) {
        Reconciler::tick_once(self).await
    }
}
