// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn validate_cwd_rejects_missing_directory() {
    let err = validate_cwd(Path::new("/definitely/not/a/real/path")).unwrap_err();
    assert!(matches!(err, ProcessError::SpawnFailed(_)));
}

#[test]
fn validate_cwd_accepts_existing_directory() {
    assert!(validate_cwd(Path::new(".")).is_ok());
}

#[test]
fn env_map_collects_pairs() {
    let pairs = vec![("A".to_string(), "1".to_string()), ("B".to_string(), "2".to_string())];
    let map = env_map(&pairs);
    assert_eq!(map.get("A"), Some(&"1".to_string()));
    assert_eq!(map.len(), 2);
}
