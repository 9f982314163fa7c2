// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors produced by the state store.

use oj_core::{CoreError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("quota exceeded: {reason}")]
    QuotaExceeded { reason: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl CoreError for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StorageError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            StorageError::Conflict { .. } => ErrorKind::Conflict,
            StorageError::Database(_) => ErrorKind::Transient,
            StorageError::Invariant(_) => ErrorKind::InvariantViolation,
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StorageError::NotFound {
                kind: "row",
                id: String::new(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StorageError::AlreadyExists {
                    kind: "row",
                    id: db_err.message().to_string(),
                }
            }
            other => StorageError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
