// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn confirm_timeout_display_includes_duration() {
    let err = BrokerError::ConfirmTimeout(std::time::Duration::from_secs(5));
    assert!(err.to_string().contains("5s"));
}
