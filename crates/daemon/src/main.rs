// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Odd Jobs Daemon (ojd)
//!
//! Background process that supervises runner child processes for a
//! project, enforces token budgets, and exposes the whole thing over
//! HTTP. Wires the concrete Postgres/OS-process/AMQP adapters into the
//! generic `oj-engine` components, then hands the result to `oj-api`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oj_adapters::{AmqpBrokerAdapter, NoOpNotifyAdapter, OsProcessAdapter};
use oj_core::SystemClock;
use oj_daemon::DaemonConfig;
use oj_engine::{BudgetEnforcer, CacheLayer, DaemonMetrics, OutboxPublisher, Reconciler, SessionTracker, Supervisor};
use oj_storage::PgStateStore;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ojd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ojd {}", env!("CARGO_PKG_VERSION"));
                println!("Odd Jobs Daemon - supervises runner processes and serves the API over HTTP.");
                println!();
                println!("USAGE:");
                println!("    ojd [--config PATH]");
                return Ok(());
            }
            "--config" => {}
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: ojd [--config PATH]");
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .position(|a| a == "--config")
        .and_then(|i| std::env::args().nth(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ojd.toml"));
    let config = DaemonConfig::load(&config_path)?;

    if config.security.auth_token.is_none() {
        info!("no auth secret configured; API authentication is disabled for this instance");
    }

    let store = Arc::new(PgStateStore::connect(&config.store.database_url(), config.store.max_connections).await?);
    store.migrate().await?;

    let metrics = Arc::new(DaemonMetrics::default());
    let clock = SystemClock;
    let process = OsProcessAdapter::new();
    let stop_grace = Duration::from_secs(config.shutdown_grace_seconds);

    let supervisor = Arc::new(Supervisor::new(process, store.clone(), clock, metrics.clone(), stop_grace));
    let budget = Arc::new(BudgetEnforcer::new(store.clone(), NoOpNotifyAdapter::new(), clock, metrics.clone()));
    let sessions = Arc::new(SessionTracker::new(store.clone(), clock));
    let reconciler = Arc::new(Reconciler::new(supervisor.clone(), budget.clone(), config.reconcile_interval_seconds));
    let cache = Arc::new(CacheLayer::new(
        store.clone() as Arc<dyn oj_storage::StateStore>,
        oj_engine::TtlMapBackend::default(),
        Duration::from_secs(5),
    ));

    let shutdown = CancellationToken::new();

    let reconciler_loop = reconciler.clone();
    let reconcile_interval = Duration::from_secs(config.reconcile_interval_seconds);
    let reconcile_shutdown = shutdown.clone();
    let reconcile_handle = tokio::spawn(async move {
        reconciler_loop.run(reconcile_interval, reconcile_shutdown).await;
    });

    let outbox_interval = Duration::from_secs(config.outbox_poll_interval_seconds);
    let outbox_batch_size = config.outbox_batch_size;
    let outbox_shutdown = shutdown.clone();
    let outbox_handle = if config.broker.enabled {
        let broker = AmqpBrokerAdapter::connect(
            &config.broker.amqp_uri(),
            &config.broker.exchange,
            config.broker.publisher_confirms,
            Duration::from_secs(5),
        )
        .await?;
        let publisher = OutboxPublisher::new(broker, store.clone(), clock, metrics.clone(), outbox_batch_size, Duration::from_secs(5));
        Some(tokio::spawn(async move { publisher.run(outbox_interval, outbox_shutdown).await }))
    } else {
        info!("no broker configured; outbox entries accumulate without delivery");
        None
    };

    let security = Arc::new(oj_api::security::SecurityConfig {
        auth_token: config.security.auth_token.clone(),
        hmac_secret: config.security.hmac_secret.clone(),
        rate_limit_per_minute: config.security.rate_limit_per_minute,
        rate_limit_burst: config.security.rate_limit_burst,
    });

    let app_state = oj_api::state::AppState {
        runners: supervisor.clone(),
        budget: budget.clone(),
        sessions,
        reconciler: reconciler.clone(),
        store: store.clone(),
        cache,
        metrics: metrics.clone(),
        process_config: oj_api::state::RunnerProcessConfig {
            command: config.runner_command.clone(),
            cwd: config.runner_cwd.clone(),
        },
        security,
    };

    let router = oj_api::build_router(app_state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.api_port)).await?;
    info!(port = config.api_port, "ojd listening");

    let serve_shutdown = shutdown.clone();
    let serve = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { serve_shutdown.cancelled().await });

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = serve => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
        _ = sigterm.recv() => {
            info!("received sigterm, shutting down");
        }
    }

    shutdown.cancel();
    supervisor.shutdown().await;
    let _ = reconcile_handle.await;
    if let Some(handle) = outbox_handle {
        let _ = handle.await;
    }

    Ok(())
}
