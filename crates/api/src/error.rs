// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps every domain error to the wire shape: status code, machine code,
//! human message (spec.md §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use oj_core::{CoreError, ErrorKind};
use oj_engine::EngineError;
use oj_storage::StorageError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("request signature invalid or expired")]
    BadSignature,

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Engine(e) => e.kind(),
            ApiError::Storage(e) => e.kind(),
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::RateLimited => ErrorKind::QuotaExceeded,
            ApiError::BadSignature => ErrorKind::Unauthorized,
            ApiError::BadRequest(_) => ErrorKind::Conflict,
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InvariantViolation => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::InvariantViolation {
            tracing::error!(error = %self, "invariant violation reached the api boundary");
        }
        let body = ErrorBody {
            code: self.kind().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
