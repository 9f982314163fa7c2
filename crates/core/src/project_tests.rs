// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_project_starts_idle_with_empty_counters() {
    let p = Project::new("demo", PathBuf::from("/tmp/demo"), 1_000);
    assert_eq!(p.status, ProjectStatus::Idle);
    assert_eq!(p.counters, ProjectCounters::default());
    assert_eq!(p.created_at_ms, 1_000);
    assert_eq!(p.updated_at_ms, 1_000);
    assert!(p.last_accessed_at_ms.is_none());
    assert!(!p.is_archived());
}

#[test]
fn touch_accessed_bumps_both_timestamps() {
    let mut p = Project::new("demo", PathBuf::from("/tmp/demo"), 0);
    p.touch_accessed(500);
    assert_eq!(p.last_accessed_at_ms, Some(500));
    assert_eq!(p.updated_at_ms, 500);
}

#[test]
fn archive_sets_status_and_timestamp() {
    let mut p = Project::new("demo", PathBuf::from("/tmp/demo"), 0);
    p.archive(999);
    assert!(p.is_archived());
    assert_eq!(p.archived_at_ms, Some(999));
}

#[test]
fn round_trips_through_json() {
    let p = Project::new("demo", PathBuf::from("/tmp/demo"), 42);
    let json = serde_json::to_string(&p).unwrap();
    let back: Project = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, p.name);
    assert_eq!(back.status, p.status);
}
