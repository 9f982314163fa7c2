// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache-aside layer over the state store (spec.md §4.8, optional):
//! short-TTL reads for hot paths (project lookup, runner lookup,
//! runner-list-by-project), backed by a pluggable [`CacheBackend`] so a
//! future out-of-process backend can slot in without touching callers.
//! The state store is always authoritative; a backend error degrades to a
//! plain cache miss rather than surfacing to the caller.

use async_trait::async_trait;
use oj_core::{Project, Runner};
use oj_storage::StateStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Minimal cache backend contract. Implementations store opaque
/// JSON-serialized bytes; `CacheLayer` owns (de)serialization so the
/// backend itself stays storage-format agnostic.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process TTL map, the default backend (spec.md §4.8: "no external
/// cache dependency is introduced since none of the example repos pull
/// one in for this kind of hot-read cache").
#[derive(Default)]
pub struct TtlMapBackend {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

#[async_trait]
impl CacheBackend for TtlMapBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

fn project_key(name: &str) -> String {
    format!("project:{name}")
}

fn runner_key(id: &str) -> String {
    format!("runner:{id}")
}

fn runner_list_key(project_name: &str) -> String {
    format!("runner-list:{project_name}")
}

pub struct CacheLayer<S: ?Sized, B = TtlMapBackend> {
    store: Arc<S>,
    backend: B,
    ttl: Duration,
}

impl<S, B> CacheLayer<S, B>
where
    S: StateStore + ?Sized,
    B: CacheBackend,
{
    pub fn new(store: Arc<S>, backend: B, ttl: Duration) -> Self {
        Self { store, backend, ttl }
    }

    async fn read_through<T, F, Fut>(&self, key: String, fetch: F) -> oj_storage::Result<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = oj_storage::Result<T>>,
    {
        if let Ok(Some(bytes)) = self.backend.get(&key).await {
            if let Ok(value) = serde_json::from_slice::<T>(&bytes) {
                return Ok(value);
            }
        }
        let value = fetch().await?;
        if let Ok(bytes) = serde_json::to_vec(&value) {
            let _ = self.backend.set(&key, bytes, self.ttl).await;
        }
        Ok(value)
    }

    pub async fn get_project(&self, name: &str) -> oj_storage::Result<Project> {
        let store = self.store.clone();
        let name_owned = name.to_string();
        self.read_through(project_key(name), || async move { store.get_project(&name_owned).await }).await
    }

    pub async fn get_runner(&self, id: &str) -> oj_storage::Result<Runner> {
        let store = self.store.clone();
        let id_owned = id.to_string();
        self.read_through(runner_key(id), || async move { store.get_runner(&id_owned).await }).await
    }

    pub async fn list_runners_by_project(&self, project_name: &str) -> oj_storage::Result<Vec<Runner>> {
        let store = self.store.clone();
        let project_owned = project_name.to_string();
        self.read_through(runner_list_key(project_name), || async move {
            store.list_runners(Some(&project_owned)).await
        })
        .await
    }

    /// Invalidate every cache entry a write to `project_name` could have
    /// made stale. Called immediately after any mutating store call
    /// (spec.md §4.8: "writes to the state store must invalidate the
    /// corresponding cache keys immediately").
    pub async fn invalidate_project(&self, project_name: &str) {
        let _ = self.backend.del(&project_key(project_name)).await;
        let _ = self.backend.del(&runner_list_key(project_name)).await;
    }

    pub async fn invalidate_runner(&self, runner_id: &str, project_name: &str) {
        let _ = self.backend.del(&runner_key(runner_id)).await;
        let _ = self.backend.del(&runner_list_key(project_name)).await;
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
