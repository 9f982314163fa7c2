// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state. Holds trait objects so the router never needs
//! the process/broker/notify/clock type parameters `oj-engine` is generic
//! over (see `facade.rs`).

use crate::facade::{BudgetFacade, ReconcileFacade, RunnerFacade, SessionFacade};
use crate::security::SecurityConfig;
use oj_engine::{CacheLayer, DaemonMetrics};
use oj_storage::StateStore;
use std::sync::Arc;

/// Runner launch-time configuration the facade doesn't take from the
/// caller: the executable to spawn and its working directory.
#[derive(Debug, Clone)]
pub struct RunnerProcessConfig {
    pub command: String,
    pub cwd: std::path::PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub runners: Arc<dyn RunnerFacade>,
    pub budget: Arc<dyn BudgetFacade>,
    pub sessions: Arc<dyn SessionFacade>,
    pub reconciler: Arc<dyn ReconcileFacade>,
    pub store: Arc<dyn StateStore>,
    pub cache: Arc<CacheLayer<dyn StateStore>>,
    pub metrics: Arc<DaemonMetrics>,
    pub process_config: RunnerProcessConfig,
    pub security: Arc<SecurityConfig>,
}
