// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::process::{ProcessAdapter, ProcessError, ProcessHandle, ProcessSpawnConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::Instrument;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcess<P> {
    inner: P,
}

impl<P> TracedProcess<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: ProcessAdapter> ProcessAdapter for TracedProcess<P> {
    async fn spawn(
        &self,
        config: ProcessSpawnConfig,
    ) -> Result<(ProcessHandle, Option<u32>), ProcessError> {
        let span = tracing::info_span!("process.spawn", command = %config.command, cwd = %config.cwd.display());
        async {
            tracing::info!(args = ?config.args, "starting");
            let start = std::time::Instant::now();
            let result = self.inner.spawn(config).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok((handle, pid)) => {
                    tracing::info!(handle = handle.as_str(), ?pid, elapsed_ms, "process spawned")
                }
                Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> Result<Option<i32>, ProcessError> {
        let result = self.inner.stop(handle, grace).await;
        tracing::info_span!("process.stop", handle = handle.as_str()).in_scope(|| match &result {
            Ok(code) => tracing::info!(?code, "stopped"),
            Err(e) => tracing::warn!(error = %e, "stop failed (may be expected)"),
        });
        result
    }

    async fn is_alive(&self, handle: &ProcessHandle) -> Result<bool, ProcessError> {
        let result = self.inner.is_alive(handle).await;
        tracing::trace!(handle = handle.as_str(), alive = ?result.as_ref().ok(), "checked");
        result
    }

    async fn exit_code(&self, handle: &ProcessHandle) -> Result<Option<i32>, ProcessError> {
        self.inner.exit_code(handle).await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
