// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP facade over the supervision engine (spec.md §4.6). `oj-daemon`
//! wires concrete adapters into the generic `oj-engine` components, wraps
//! them behind the facade traits below, and calls [`build_router`].

pub mod auth;
pub mod dto;
pub mod error;
pub mod facade;
pub mod handlers;
pub mod rate_limit;
pub mod security;
pub mod signing;
pub mod state;

use auth::AuthLayer;
use axum::routing::{get, post};
use axum::Router;
use rate_limit::RateLimitLayer;
use signing::SigningLayer;
use state::AppState;
use tower::ServiceBuilder;

/// Builds the full router: health/metrics are mounted unauthenticated,
/// everything else sits behind auth, then rate limiting, then optional
/// HMAC signing (innermost, since it needs the raw authenticated caller).
pub fn build_router(state: AppState) -> Router {
    let security = state.security.clone();
    if security.auth_token.is_none() {
        tracing::warn!("no auth secret configured; API authentication is disabled");
    }

    let protected = Router::new()
        .route("/runners", post(handlers::launch_runner).get(handlers::list_runners))
        .route(
            "/runners/:id",
            get(handlers::get_runner).post(handlers::stop_runner),
        )
        .route("/runners/:id/heartbeat", post(handlers::send_heartbeat))
        .route("/projects", post(handlers::create_project).get(handlers::list_projects))
        .route("/projects/:name", get(handlers::get_project))
        .route("/projects/:name/archive", post(handlers::archive_project))
        .route("/projects/:name/sessions", get(handlers::list_sessions))
        .route("/sessions/:id", get(handlers::get_session))
        .route("/sessions/:id/resume", post(handlers::resume_session))
        .route("/status", get(handlers::get_status))
        .route("/reconcile", post(handlers::trigger_reconciliation))
        .layer(
            ServiceBuilder::new()
                .layer(AuthLayer::new(security.auth_token.clone()))
                .layer(RateLimitLayer::new(security.rate_limit_per_minute, security.rate_limit_burst))
                .layer(SigningLayer::new(security.hmac_secret.clone())),
        );

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(protected)
        .with_state(state)
}
