// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner supervisor: owns the in-memory registry of live runners and the
//! actual OS processes behind them (spec.md §4.2).

use crate::error::{EngineError, Result};
use crate::metrics::DaemonMetrics;
use oj_adapters::{ProcessAdapter, ProcessHandle, ProcessSpawnConfig};
use oj_core::{Clock, DomainEvent, HeartbeatReport, Runner, RunnerId, RunnerLaunchRequest};
use oj_storage::StateStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Bounded heartbeat fan-out capacity per runner. A slow subscriber lags
/// and starts missing the oldest heartbeats rather than backing up the
/// supervisor.
const HEARTBEAT_CHANNEL_CAPACITY: usize = 16;

const DEFAULT_OUTBOX_MAX_ATTEMPTS: u32 = 10;

/// A runner the supervisor has actually spawned and is watching.
struct ManagedRunner {
    handle: ProcessHandle,
    heartbeat_tx: broadcast::Sender<HeartbeatReport>,
    stop: CancellationToken,
}

/// Generic over the process boundary so tests run against
/// `oj_adapters::process::FakeProcessAdapter` without touching a real OS
/// process.
pub struct Supervisor<P, S, C> {
    process: P,
    store: Arc<S>,
    clock: C,
    registry: Mutex<HashMap<RunnerId, ManagedRunner>>,
    metrics: Arc<DaemonMetrics>,
    stop_grace: Duration,
}

impl<P, S, C> Supervisor<P, S, C>
where
    P: ProcessAdapter,
    S: StateStore,
    C: Clock,
{
    pub fn new(process: P, store: Arc<S>, clock: C, metrics: Arc<DaemonMetrics>, stop_grace: Duration) -> Self {
        Self {
            process,
            store,
            clock,
            registry: Mutex::new(HashMap::new()),
            metrics,
            stop_grace,
        }
    }

    /// `Launch`: create the row, spawn the child, register it. On spawn
    /// failure the runner row is left in `failed` and no registry entry is
    /// created (spec.md §4.2 state diagram: `starting` →(spawn fail)→ `failed`).
    ///
    /// The child's command-line carries the identity args spec.md §6
    /// requires (runner id, project name, project path) ahead of any
    /// caller-forwarded flags — the runner id only exists once the store
    /// has assigned it, so this builds the full argument list itself
    /// rather than accepting a pre-built one.
    pub async fn launch(
        &self,
        request: RunnerLaunchRequest,
        quota_max: u32,
        command: String,
        project_path: std::path::PathBuf,
        cwd: std::path::PathBuf,
    ) -> Result<Runner> {
        let project_name = request.project_name.clone();
        let forwarded_flags = request.config.flags.clone();
        let runner = self.store.create_runner_tx(request, quota_max).await?;

        let mut args = vec![
            runner.id.as_str().to_string(),
            project_name,
            project_path.display().to_string(),
        ];
        args.extend(forwarded_flags);

        let env = runner
            .config
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let spawn_result = self
            .process
            .spawn(ProcessSpawnConfig { command, args, env, cwd })
            .await;

        let now_ms = self.clock.now_ms();
        match spawn_result {
            Ok((handle, pid)) => {
                if let Some(pid) = pid {
                    self.store.update_runner_runtime_id(&runner.id, pid).await?;
                }
                let (heartbeat_tx, _) = broadcast::channel(HEARTBEAT_CHANNEL_CAPACITY);
                self.registry.lock().insert(
                    runner.id.clone(),
                    ManagedRunner {
                        handle,
                        heartbeat_tx,
                        stop: CancellationToken::new(),
                    },
                );
                self.metrics.runners_launched.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Ok(runner)
            }
            Err(e) => {
                self.store.mark_runner_failed(&runner.id, now_ms).await?;
                self.metrics.runners_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let ev = DomainEvent::RunnerSpawnFailed {
                    runner_id: runner.id.clone(),
                    project_name: runner.project_name.clone(),
                    error: e.to_string(),
                };
                let _ = self.store.record_event(&ev, DEFAULT_OUTBOX_MAX_ATTEMPTS, now_ms).await;
                Err(EngineError::Process(e))
            }
        }
    }

    /// `ProcessHeartbeat`: persist, then best-effort fan out to local
    /// subscribers. A runner the registry doesn't know about is `NotFound`
    /// — the caller treats that as "stop heartbeating" (spec.md §4.2).
    pub async fn process_heartbeat(&self, hb: HeartbeatReport) -> Result<()> {
        {
            let registry = self.registry.lock();
            let managed = registry
                .get(&hb.runner_id)
                .ok_or_else(|| EngineError::RunnerNotManaged(hb.runner_id.to_string()))?;
            // Err means no subscribers right now; that's the common case and
            // not a failure worth surfacing.
            let _ = managed.heartbeat_tx.send(hb.clone());
        }
        let now_ms = self.clock.now_ms();
        self.store.update_runner_heartbeat(&hb, now_ms).await?;
        Ok(())
    }

    /// Subscribe to the live heartbeat fan-out for a managed runner.
    /// `None` if the runner isn't currently managed.
    pub fn subscribe_heartbeats(&self, id: &RunnerId) -> Option<broadcast::Receiver<HeartbeatReport>> {
        self.registry.lock().get(id).map(|m| m.heartbeat_tx.subscribe())
    }

    /// `StopRunner`: signal the child, wait up to the grace period, then
    /// force-kill. Removes the registry entry regardless of outcome.
    pub async fn stop_runner(&self, id: &RunnerId, force: bool) -> Result<Runner> {
        let managed = {
            let mut registry = self.registry.lock();
            registry
                .remove(id)
                .ok_or_else(|| EngineError::RunnerNotManaged(id.to_string()))?
        };
        managed.stop.cancel();

        let grace = if force { Duration::ZERO } else { self.stop_grace };
        let exit_code = self.process.stop(&managed.handle, grace).await?;

        let now_ms = self.clock.now_ms();
        let runner = self.store.terminate_runner(id, exit_code, now_ms).await?;
        self.metrics.runners_terminated.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let ev = DomainEvent::RunnerTerminated {
            runner_id: id.clone(),
            project_name: runner.project_name.clone(),
            exit_code,
        };
        let _ = self.store.record_event(&ev, DEFAULT_OUTBOX_MAX_ATTEMPTS, now_ms).await;
        Ok(runner)
    }

    /// `ReconcileRunners`: flip every stale runner to `failed` server-side
    /// and evict it locally. Idempotent — a second call with no newly-stale
    /// runners is a no-op (spec.md §4.2).
    pub async fn reconcile_runners(&self, heartbeat_ttl_default_secs: u64) -> Result<Vec<RunnerId>> {
        let now_ms = self.clock.now_ms();
        let stale = self
            .store
            .reconcile_stale_runners(heartbeat_ttl_default_secs, now_ms)
            .await?;
        for id in &stale {
            self.registry.lock().remove(id);
            if let Ok(runner) = self.store.get_runner(id.as_str()).await {
                let ev = DomainEvent::RunnerFailed {
                    runner_id: id.clone(),
                    project_name: runner.project_name,
                    reason: "heartbeat ttl exceeded".to_string(),
                };
                let _ = self.store.record_event(&ev, DEFAULT_OUTBOX_MAX_ATTEMPTS, now_ms).await;
            }
        }
        Ok(stale)
    }

    /// `GetActiveRunners`: snapshot of the registry's keys.
    pub fn active_runner_ids(&self) -> Vec<RunnerId> {
        self.registry.lock().keys().cloned().collect()
    }

    pub fn is_managed(&self, id: &RunnerId) -> bool {
        self.registry.lock().contains_key(id)
    }

    /// `Shutdown`: best-effort stop of every runner, each bounded by the
    /// grace period, never blocking shutdown on a single stuck child.
    pub async fn shutdown(&self) {
        let ids: Vec<RunnerId> = self.registry.lock().keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop_runner(&id, false).await {
                tracing::warn!(runner_id = %id, error = %e, "shutdown: stop_runner failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
