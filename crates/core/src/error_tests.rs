// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct FakeError(ErrorKind);

impl CoreError for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[test]
fn transient_errors_are_retryable() {
    assert!(FakeError(ErrorKind::Transient).is_retryable());
    assert!(!FakeError(ErrorKind::NotFound).is_retryable());
}

#[test]
fn display_matches_wire_code() {
    assert_eq!(ErrorKind::QuotaExceeded.to_string(), "quota_exceeded");
    assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
}
