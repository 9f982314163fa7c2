// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One handler per spec.md §4.6 conceptual endpoint. Handlers only
//! translate DTOs and dispatch to `AppState`'s facades; no domain logic
//! lives here.

use crate::dto::*;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use oj_core::{Clock, Project, RunnerId, RunnerLaunchRequest, SessionId, SystemClock};

pub async fn launch_runner(
    State(state): State<AppState>,
    Json(req): Json<LaunchRunnerRequest>,
) -> ApiResult<Json<oj_core::Runner>> {
    let quota = state.store.get_resource_quota(&req.project).await?;
    let request = RunnerLaunchRequest {
        project_name: req.project.clone(),
        runtime: req.runtime_type.into_runtime_kind(),
        config: req.into_config(),
        max_restart_attempts: req.max_restart_attempts,
        heartbeat_ttl_seconds: req.heartbeat_ttl_seconds,
        session_id: req.session_id.clone().map(SessionId::new),
    };
    let runner = state
        .runners
        .launch(
            request,
            quota.max_concurrent_runners,
            state.process_config.command.clone(),
            req.path.clone(),
            state.process_config.cwd.clone(),
        )
        .await?;
    state.cache.invalidate_project(&req.project).await;
    Ok(Json(runner))
}

pub async fn stop_runner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StopRunnerRequest>,
) -> ApiResult<Json<oj_core::Runner>> {
    let runner_id = RunnerId::new(id);
    let runner = state.runners.stop(&runner_id, req.force).await?;
    state.cache.invalidate_runner(runner_id.as_str(), &runner.project_name).await;
    Ok(Json(runner))
}

pub async fn get_runner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<oj_core::Runner>> {
    let runner = state.cache.get_runner(&id).await?;
    Ok(Json(runner))
}

pub async fn list_runners(
    State(state): State<AppState>,
    Query(q): Query<ListRunnersQuery>,
) -> ApiResult<Json<Vec<oj_core::Runner>>> {
    let runners = match q.project {
        Some(ref project) => state.cache.list_runners_by_project(project).await?,
        None => state.store.list_runners(None).await?,
    };
    Ok(Json(runners))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<Project>> {
    let now_ms = SystemClock.now_ms();
    let project = state.store.create_project(Project::new(req.name, req.path, now_ms)).await?;
    Ok(Json(project))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Project>> {
    let project = state.cache.get_project(&name).await?;
    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(q): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = state.store.list_projects(q.status).await?;
    Ok(Json(projects))
}

pub async fn archive_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Project>> {
    let now_ms = SystemClock.now_ms();
    let project = state.store.archive_project(&name, now_ms).await?;
    state.cache.invalidate_project(&name).await;
    Ok(Json(project))
}

/// `SendHeartbeat` never returns a hard error for an unknown or unmanaged
/// runner; `success=false` tells the agent to stop sending (spec.md §4.6).
pub async fn send_heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    let hb = oj_core::HeartbeatReport {
        runner_id: RunnerId::new(id),
        status: req.status,
        cpu_percent: req.cpu_percent,
        memory_mb: req.memory_mb,
        tokens_used: req.tokens_used,
        session_id: req.session_id.map(SessionId::new),
        agent_version: req.agent_version,
        hostname: req.hostname,
    };
    let runner_id = hb.runner_id.clone();
    match state.runners.heartbeat(hb).await {
        Ok(()) => {
            if let Ok(runner) = state.store.get_runner(runner_id.as_str()).await {
                state.cache.invalidate_runner(runner_id.as_str(), &runner.project_name).await;
            }
            Json(HeartbeatResponse { success: true, error: None })
        }
        Err(e) => Json(HeartbeatResponse { success: false, error: Some(e.to_string()) }),
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        metrics: state.metrics.snapshot(),
        active_runners: state.store.list_runners(None).await.map(|r| r.len()).unwrap_or(0),
    })
}

pub async fn trigger_reconciliation(State(state): State<AppState>) -> Json<ReconcileResponse> {
    let (stale_evicted, budgets_rolled) = state.reconciler.trigger().await;
    Json(ReconcileResponse { stale_evicted, budgets_rolled })
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
) -> ApiResult<Json<Vec<oj_core::Session>>> {
    let sessions = state.store.list_sessions(&project_name).await?;
    Ok(Json(sessions))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<oj_core::Session>> {
    let session = state.store.get_session(&id).await?;
    Ok(Json(session))
}

pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResumeSessionResponse>> {
    let decision = state.sessions.resume(&SessionId::new(id)).await?;
    Ok(Json(decision.into()))
}

pub async fn healthz() -> &'static str {
    "ok"
}
