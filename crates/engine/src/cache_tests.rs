// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oj_storage::MemoryStateStore;
use std::path::PathBuf;

fn layer() -> (CacheLayer<MemoryStateStore>, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::default());
    let layer = CacheLayer::new(store.clone(), TtlMapBackend::default(), Duration::from_secs(60));
    (layer, store)
}

#[tokio::test]
async fn get_project_populates_cache_on_miss() {
    let (layer, store) = layer();
    store.create_project(Project::new("demo", PathBuf::from("/tmp"), 0)).await.unwrap();

    let first = layer.get_project("demo").await.unwrap();
    assert_eq!(first.name, "demo");

    let cached = layer.backend.get(&project_key("demo")).await.unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn invalidate_project_clears_cached_entry() {
    let (layer, store) = layer();
    store.create_project(Project::new("demo", PathBuf::from("/tmp"), 0)).await.unwrap();
    layer.get_project("demo").await.unwrap();
    assert!(layer.backend.get(&project_key("demo")).await.unwrap().is_some());

    layer.invalidate_project("demo").await;
    assert!(layer.backend.get(&project_key("demo")).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_entry_is_treated_as_a_miss() {
    let store = Arc::new(MemoryStateStore::default());
    let layer = CacheLayer::new(store.clone(), TtlMapBackend::default(), Duration::from_millis(1));
    store.create_project(Project::new("demo", PathBuf::from("/tmp"), 0)).await.unwrap();
    layer.get_project("demo").await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(layer.backend.get(&project_key("demo")).await.unwrap().is_none());
}
