// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the supervision engine.

use oj_adapters::{BrokerError, NotifyError, ProcessError};
use oj_core::{CoreError, ErrorKind};
use oj_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("runner {0} is not managed by this daemon")]
    RunnerNotManaged(String),

    #[error("budget exceeded for scope {scope:?}/{scope_id:?}: {used} + {requested} > {limit}")]
    BudgetExceeded {
        scope: oj_core::BudgetScope,
        scope_id: Option<String>,
        used: u64,
        requested: u64,
        limit: u64,
    },

    #[error("cache error: {0}")]
    Cache(String),
}

impl CoreError for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Storage(e) => e.kind(),
            EngineError::Process(_) => ErrorKind::Transient,
            EngineError::Broker(_) => ErrorKind::Transient,
            EngineError::Notify(_) => ErrorKind::Transient,
            EngineError::RunnerNotManaged(_) => ErrorKind::NotFound,
            EngineError::BudgetExceeded { .. } => ErrorKind::QuotaExceeded,
            EngineError::Cache(_) => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
