// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed `StateStore`. The sole writer of the `runners`/`outbox`
//! pair is `create_runner_tx`, which takes a per-project advisory lock so
//! concurrent launches for the same project serialize while launches for
//! different projects never block each other (spec.md §4.1/§5).

use crate::{Result, StateStore, StorageError};
use async_trait::async_trait;
use oj_core::{
    BudgetScope, DomainEvent, EventId, HeartbeatReport, OutboxEntry, OutboxId, PeriodGranularity,
    Project, ProjectCounters, ProjectName, ProjectStatus, ResourceQuota, Runner, RunnerConfig,
    RunnerId, RunnerLaunchRequest, RunnerResourceUsage, RunnerStatus, RuntimeKind, Session,
    SessionId, TokenBudget, TranscriptRef,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::path::PathBuf;
use std::time::Duration;

pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Deterministic i64 key for `pg_advisory_xact_lock`, derived from the
    /// project name. Collisions only mean two unrelated projects occasionally
    /// serialize against each other, never incorrect quota enforcement —
    /// the quota count itself is still scoped by `project_name`.
    fn advisory_key(project_name: &str) -> i64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        project_name.hash(&mut hasher);
        hasher.finish() as i64
    }

    fn row_to_project(row: &sqlx::postgres::PgRow) -> Result<Project> {
        let tags_json: serde_json::Value = row.try_get("tags").map_err(db_err)?;
        let tags = serde_json::from_value(tags_json).unwrap_or_default();
        let status_str: String = row.try_get("status").map_err(db_err)?;
        Ok(Project {
            name: row.try_get("name").map_err(db_err)?,
            path: PathBuf::from(row.try_get::<String, _>("path").map_err(db_err)?),
            status: parse_project_status(&status_str),
            description: row.try_get("description").map_err(db_err)?,
            tags,
            counters: ProjectCounters {
                total_runners: row.try_get::<i64, _>("total_runners").map_err(db_err)? as u64,
                active_runners: row.try_get::<i64, _>("active_runners").map_err(db_err)? as u64,
                total_sessions: row.try_get::<i64, _>("total_sessions").map_err(db_err)? as u64,
                total_tokens: row.try_get::<i64, _>("total_tokens").map_err(db_err)? as u64,
            },
            created_at_ms: row.try_get("created_at_ms").map_err(db_err)?,
            last_accessed_at_ms: row.try_get("last_accessed_at_ms").map_err(db_err)?,
            archived_at_ms: row.try_get("archived_at_ms").map_err(db_err)?,
            updated_at_ms: row.try_get("updated_at_ms").map_err(db_err)?,
        })
    }

    fn row_to_runner(row: &sqlx::postgres::PgRow) -> Result<Runner> {
        let config_json: serde_json::Value = row.try_get("config").map_err(db_err)?;
        let runtime_type: String = row.try_get("runtime_type").map_err(db_err)?;
        let runtime_id: Option<String> = row.try_get("runtime_id").map_err(db_err)?;
        let runtime = match runtime_type.as_str() {
            "container" => RuntimeKind::Container {
                container_id: runtime_id,
            },
            "remote" => RuntimeKind::Remote { handle: runtime_id },
            _ => RuntimeKind::Process {
                pid: runtime_id.and_then(|s| s.parse().ok()),
            },
        };
        Ok(Runner {
            id: RunnerId::new(row.try_get::<String, _>("id").map_err(db_err)?),
            project_name: row.try_get("project_name").map_err(db_err)?,
            runtime,
            status: parse_runner_status(&row.try_get::<String, _>("status").map_err(db_err)?),
            config: serde_json::from_value(config_json).unwrap_or_default(),
            session_id: row
                .try_get::<Option<String>, _>("session_id")
                .map_err(db_err)?
                .map(SessionId::new),
            usage: RunnerResourceUsage {
                tokens_used: row.try_get::<i64, _>("tokens_used").map_err(db_err)? as u64,
                cpu_percent: row.try_get("cpu_percent").map_err(db_err)?,
                memory_mb: row.try_get::<i32, _>("memory_mb").map_err(db_err)? as u32,
            },
            restart_attempts: row.try_get::<i32, _>("restart_attempts").map_err(db_err)? as u32,
            max_restart_attempts: row.try_get::<i32, _>("max_restart_attempts").map_err(db_err)?
                as u32,
            started_at_ms: row.try_get("started_at_ms").map_err(db_err)?,
            last_heartbeat_ms: row.try_get("last_heartbeat_ms").map_err(db_err)?,
            terminated_at_ms: row.try_get("terminated_at_ms").map_err(db_err)?,
            heartbeat_ttl_seconds: row.try_get::<i64, _>("heartbeat_ttl_seconds").map_err(db_err)?
                as u64,
            exit_code: row.try_get("exit_code").map_err(db_err)?,
        })
    }

    fn row_to_session(row: &sqlx::postgres::PgRow) -> Result<Session> {
        Ok(Session {
            id: SessionId::new(row.try_get::<String, _>("id").map_err(db_err)?),
            runner_id: RunnerId::new(row.try_get::<String, _>("runner_id").map_err(db_err)?),
            project_name: row.try_get("project_name").map_err(db_err)?,
            started_at_ms: row.try_get("started_at_ms").map_err(db_err)?,
            ended_at_ms: row.try_get("ended_at_ms").map_err(db_err)?,
            last_message_at_ms: row.try_get("last_message_at_ms").map_err(db_err)?,
            message_count: row.try_get::<i64, _>("message_count").map_err(db_err)? as u64,
            tokens_used: row.try_get::<i64, _>("tokens_used").map_err(db_err)? as u64,
            resumable: row.try_get("resumable").map_err(db_err)?,
            resumed_from: row
                .try_get::<Option<String>, _>("resumed_from")
                .map_err(db_err)?
                .map(SessionId::new),
            summary: row.try_get("summary").map_err(db_err)?,
            transcript: TranscriptRef {
                storage_key: row.try_get("transcript_storage_key").map_err(db_err)?,
                size_bytes: row
                    .try_get::<Option<i64>, _>("transcript_size_bytes")
                    .map_err(db_err)?
                    .map(|n| n as u64),
            },
        })
    }

    fn row_to_outbox(row: &sqlx::postgres::PgRow) -> Result<OutboxEntry> {
        Ok(OutboxEntry {
            id: OutboxId::new(row.try_get::<i64, _>("id").map_err(db_err)?.to_string()),
            event_id: EventId::new(row.try_get::<String, _>("event_id").map_err(db_err)?),
            event_type: row.try_get("event_type").map_err(db_err)?,
            payload: row.try_get("payload").map_err(db_err)?,
            routing_key: row.try_get("routing_key").map_err(db_err)?,
            delivered: row.try_get("delivered").map_err(db_err)?,
            attempts: row.try_get::<i32, _>("attempts").map_err(db_err)? as u32,
            max_attempts: row.try_get::<i32, _>("max_attempts").map_err(db_err)? as u32,
            next_retry_at_ms: row.try_get("next_retry_at_ms").map_err(db_err)?,
            last_error: row.try_get("last_error").map_err(db_err)?,
            created_at_ms: row.try_get("created_at_ms").map_err(db_err)?,
        })
    }

    fn row_to_budget(row: &sqlx::postgres::PgRow) -> Result<TokenBudget> {
        Ok(TokenBudget {
            scope: parse_budget_scope(&row.try_get::<String, _>("scope").map_err(db_err)?),
            scope_id: row.try_get("scope_id").map_err(db_err)?,
            limit_tokens: row.try_get::<i64, _>("limit_tokens").map_err(db_err)? as u64,
            used_tokens: row.try_get::<i64, _>("used_tokens").map_err(db_err)? as u64,
            period_granularity: parse_granularity(
                &row.try_get::<String, _>("period_granularity").map_err(db_err)?,
            ),
            period_start_ms: row.try_get("period_start_ms").map_err(db_err)?,
            period_end_ms: row.try_get("period_end_ms").map_err(db_err)?,
        })
    }
}

fn db_err(e: sqlx::Error) -> StorageError {
    StorageError::from(e)
}

fn parse_project_status(s: &str) -> ProjectStatus {
    match s {
        "active" => ProjectStatus::Active,
        "archived" => ProjectStatus::Archived,
        _ => ProjectStatus::Idle,
    }
}

fn project_status_str(s: ProjectStatus) -> &'static str {
    match s {
        ProjectStatus::Active => "active",
        ProjectStatus::Idle => "idle",
        ProjectStatus::Archived => "archived",
    }
}

fn parse_runner_status(s: &str) -> RunnerStatus {
    match s {
        "running" => RunnerStatus::Running,
        "paused" => RunnerStatus::Paused,
        "terminated" => RunnerStatus::Terminated,
        "failed" => RunnerStatus::Failed,
        _ => RunnerStatus::Starting,
    }
}

fn runner_status_str(s: RunnerStatus) -> &'static str {
    match s {
        RunnerStatus::Starting => "starting",
        RunnerStatus::Running => "running",
        RunnerStatus::Paused => "paused",
        RunnerStatus::Terminated => "terminated",
        RunnerStatus::Failed => "failed",
    }
}

fn parse_budget_scope(s: &str) -> BudgetScope {
    match s {
        "project" => BudgetScope::Project,
        "runner" => BudgetScope::Runner,
        _ => BudgetScope::Global,
    }
}

fn budget_scope_str(s: BudgetScope) -> &'static str {
    match s {
        BudgetScope::Global => "global",
        BudgetScope::Project => "project",
        BudgetScope::Runner => "runner",
    }
}

fn parse_granularity(s: &str) -> PeriodGranularity {
    match s {
        "daily" => PeriodGranularity::Daily,
        "weekly" => PeriodGranularity::Weekly,
        "monthly" => PeriodGranularity::Monthly,
        _ => PeriodGranularity::Hourly,
    }
}

fn granularity_str(g: PeriodGranularity) -> &'static str {
    match g {
        PeriodGranularity::Hourly => "hourly",
        PeriodGranularity::Daily => "daily",
        PeriodGranularity::Weekly => "weekly",
        PeriodGranularity::Monthly => "monthly",
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn create_project(&self, project: Project) -> Result<Project> {
        let tags = serde_json::to_value(&project.tags).map_err(|e| StorageError::Invariant(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO projects
                (name, path, status, description, tags, created_at_ms, updated_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&project.name)
        .bind(project.path.to_string_lossy().to_string())
        .bind(project_status_str(project.status))
        .bind(&project.description)
        .bind(tags)
        .bind(project.created_at_ms)
        .bind(project.updated_at_ms)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(project)
    }

    async fn get_project(&self, name: &str) -> Result<Project> {
        let row = sqlx::query("SELECT * FROM projects WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::NotFound {
                kind: "project",
                id: name.to_string(),
            })?;
        Self::row_to_project(&row)
    }

    async fn list_projects(&self, status_filter: Option<ProjectStatus>) -> Result<Vec<Project>> {
        let rows = match status_filter {
            Some(status) => sqlx::query("SELECT * FROM projects WHERE status = $1 ORDER BY name")
                .bind(project_status_str(status))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
            None => sqlx::query("SELECT * FROM projects ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
        };
        rows.iter().map(Self::row_to_project).collect()
    }

    async fn archive_project(&self, name: &str, now_ms: i64) -> Result<Project> {
        let row = sqlx::query(
            r#"
            UPDATE projects SET status = 'archived', archived_at_ms = $2, updated_at_ms = $2
            WHERE name = $1
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StorageError::NotFound {
            kind: "project",
            id: name.to_string(),
        })?;
        Self::row_to_project(&row)
    }

    async fn get_resource_quota(&self, project_name: &str) -> Result<ResourceQuota> {
        let row = sqlx::query("SELECT * FROM resource_quotas WHERE project_name = $1")
            .bind(project_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::NotFound {
                kind: "resource_quota",
                id: project_name.to_string(),
            })?;
        Ok(ResourceQuota {
            project_name: row.try_get("project_name").map_err(db_err)?,
            max_concurrent_runners: row.try_get::<i32, _>("max_concurrent_runners").map_err(db_err)?
                as u32,
            max_memory_mb: row
                .try_get::<Option<i32>, _>("max_memory_mb")
                .map_err(db_err)?
                .map(|n| n as u32),
            max_cpu_percent: row.try_get("max_cpu_percent").map_err(db_err)?,
            max_daily_tokens: row
                .try_get::<Option<i64>, _>("max_daily_tokens")
                .map_err(db_err)?
                .map(|n| n as u64),
        })
    }

    async fn create_runner_tx(
        &self,
        request: RunnerLaunchRequest,
        quota_max: u32,
    ) -> Result<Runner> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::advisory_key(&request.project_name))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let project_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE name = $1)",
        )
        .bind(&request.project_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if !project_exists {
            return Err(StorageError::NotFound {
                kind: "project",
                id: request.project_name,
            });
        }

        let active_count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM runners WHERE project_name = $1 AND status IN ('starting', 'running')",
        )
        .bind(&request.project_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if active_count as u32 >= quota_max {
            return Err(StorageError::QuotaExceeded {
                reason: format!(
                    "project {} at capacity ({active_count}/{quota_max})",
                    request.project_name
                ),
            });
        }

        let id = RunnerId::new(uuid::Uuid::new_v4().to_string());
        let (runtime_type, runtime_id): (&str, Option<String>) = match &request.runtime {
            RuntimeKind::Process { pid } => ("process", pid.map(|p| p.to_string())),
            RuntimeKind::Container { container_id } => ("container", container_id.clone()),
            RuntimeKind::Remote { handle } => ("remote", handle.clone()),
        };
        let config_json =
            serde_json::to_value(&request.config).map_err(|e| StorageError::Invariant(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO runners
                (id, project_name, runtime_type, runtime_id, status, config, session_id,
                 max_restart_attempts, started_at_ms, heartbeat_ttl_seconds)
            VALUES ($1, $2, $3, $4, 'starting', $5, $6, $7, 0, $8)
            "#,
        )
        .bind(id.as_str())
        .bind(&request.project_name)
        .bind(runtime_type)
        .bind(&runtime_id)
        .bind(&config_json)
        .bind(request.session_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(request.max_restart_attempts as i32)
        .bind(request.heartbeat_ttl_seconds as i64)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let ev = DomainEvent::RunnerStarted {
            runner_id: id.clone(),
            project_name: request.project_name.clone(),
        };
        let payload =
            serde_json::to_value(&ev).map_err(|e| StorageError::Invariant(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO outbox (event_id, event_type, payload, routing_key, created_at_ms)
            VALUES ($1, $2, $3, $4, 0)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(ev.event_type())
        .bind(&payload)
        .bind(ev.routing_key())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(Runner {
            id,
            project_name: request.project_name,
            runtime: request.runtime,
            status: RunnerStatus::Starting,
            config: request.config,
            session_id: request.session_id,
            usage: RunnerResourceUsage::default(),
            restart_attempts: 0,
            max_restart_attempts: request.max_restart_attempts,
            started_at_ms: 0,
            last_heartbeat_ms: None,
            terminated_at_ms: None,
            heartbeat_ttl_seconds: request.heartbeat_ttl_seconds,
            exit_code: None,
        })
    }

    async fn get_runner(&self, id: &str) -> Result<Runner> {
        let row = sqlx::query("SELECT * FROM runners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            })?;
        Self::row_to_runner(&row)
    }

    async fn list_runners(&self, project_name: Option<&str>) -> Result<Vec<Runner>> {
        let rows = match project_name {
            Some(p) => sqlx::query("SELECT * FROM runners WHERE project_name = $1 ORDER BY started_at_ms")
                .bind(p)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
            None => sqlx::query("SELECT * FROM runners ORDER BY started_at_ms")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
        };
        rows.iter().map(Self::row_to_runner).collect()
    }

    async fn update_runner_runtime_id(&self, id: &RunnerId, runtime_pid: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE runners SET runtime_id = $2, status = 'running' WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(runtime_pid.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_runner_heartbeat(&self, hb: &HeartbeatReport, now_ms: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE runners SET
                last_heartbeat_ms = $2,
                status = $3,
                cpu_percent = $4,
                memory_mb = $5,
                tokens_used = $6,
                session_id = COALESCE($7, session_id)
            WHERE id = $1
            "#,
        )
        .bind(hb.runner_id.as_str())
        .bind(now_ms)
        .bind(runner_status_str(hb.status))
        .bind(hb.cpu_percent)
        .bind(hb.memory_mb as i32)
        .bind(hb.tokens_used as i64)
        .bind(hb.session_id.as_ref().map(|s| s.as_str().to_string()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "runner",
                id: hb.runner_id.to_string(),
            });
        }
        Ok(())
    }

    async fn terminate_runner(
        &self,
        id: &RunnerId,
        exit_code: Option<i32>,
        now_ms: i64,
    ) -> Result<Runner> {
        let row = sqlx::query(
            r#"
            UPDATE runners SET status = 'terminated', terminated_at_ms = $2, exit_code = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_str())
        .bind(now_ms)
        .bind(exit_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StorageError::NotFound {
            kind: "runner",
            id: id.to_string(),
        })?;
        Self::row_to_runner(&row)
    }

    async fn mark_runner_failed(&self, id: &RunnerId, now_ms: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE runners SET status = 'failed', terminated_at_ms = $2 WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "runner",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn reconcile_stale_runners(
        &self,
        ttl_seconds_default: u64,
        now_ms: i64,
    ) -> Result<Vec<RunnerId>> {
        let rows = sqlx::query(
            r#"
            UPDATE runners SET status = 'failed', terminated_at_ms = $2
            WHERE status IN ('starting', 'running')
              AND $2 - COALESCE(last_heartbeat_ms, started_at_ms)
                  > COALESCE(NULLIF(heartbeat_ttl_seconds, 0), $3) * 1000
            RETURNING id
            "#,
        )
        .bind(ttl_seconds_default as i64)
        .bind(now_ms)
        .bind(ttl_seconds_default as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map(RunnerId::new).map_err(db_err))
            .collect()
    }

    async fn create_session(&self, session: Session) -> Result<Session> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, runner_id, project_name, started_at_ms, resumable, resumed_from)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id.as_str())
        .bind(session.runner_id.as_str())
        .bind(&session.project_name)
        .bind(session.started_at_ms)
        .bind(session.resumable)
        .bind(session.resumed_from.as_ref().map(|s| s.as_str().to_string()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Session> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            })?;
        Self::row_to_session(&row)
    }

    async fn list_sessions(&self, project_name: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query("SELECT * FROM sessions WHERE project_name = $1 ORDER BY started_at_ms")
            .bind(project_name)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_session).collect()
    }

    async fn list_resumable_sessions(&self, project_name: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE project_name = $1 AND resumable AND ended_at_ms IS NULL",
        )
        .bind(project_name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(Self::row_to_session).collect()
    }

    async fn record_session_message(&self, id: &SessionId, tokens: u64, now_ms: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                message_count = message_count + 1,
                tokens_used = tokens_used + $2,
                last_message_at_ms = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(tokens as i64)
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn end_session(&self, id: &SessionId, now_ms: i64) -> Result<()> {
        let result = sqlx::query("UPDATE sessions SET ended_at_ms = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now_ms)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_session_non_resumable(&self, id: &SessionId) -> Result<()> {
        let result = sqlx::query("UPDATE sessions SET resumable = FALSE WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn save_transcript_metadata(
        &self,
        id: &SessionId,
        storage_key: String,
        size_bytes: u64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET transcript_storage_key = $2, transcript_size_bytes = $3 WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(storage_key)
        .bind(size_bytes as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "session",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn record_event(
        &self,
        event: &DomainEvent,
        max_attempts: u32,
        now_ms: i64,
    ) -> Result<OutboxEntry> {
        let payload =
            serde_json::to_value(event).map_err(|e| StorageError::Invariant(e.to_string()))?;
        let row = sqlx::query(
            r#"
            INSERT INTO outbox (event_id, event_type, payload, routing_key, max_attempts, created_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(event.event_type())
        .bind(&payload)
        .bind(event.routing_key())
        .bind(max_attempts as i32)
        .bind(now_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Self::row_to_outbox(&row)
    }

    async fn get_pending_outbox_entries(&self, limit: i64, now_ms: i64) -> Result<Vec<OutboxEntry>> {
        // `FOR UPDATE SKIP LOCKED` lets multiple publisher instances drain
        // the outbox concurrently without contending on the same rows.
        let rows = sqlx::query(
            r#"
            SELECT * FROM outbox
            WHERE NOT delivered AND (next_retry_at_ms IS NULL OR next_retry_at_ms <= $2)
            ORDER BY id
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .bind(now_ms)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_outbox_delivered(&self, id: &OutboxId) -> Result<()> {
        let oid: i64 = id
            .as_str()
            .parse()
            .map_err(|_| StorageError::Invariant(format!("non-numeric outbox id {id}")))?;
        let result = sqlx::query("UPDATE outbox SET delivered = TRUE WHERE id = $1")
            .bind(oid)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "outbox",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn increment_outbox_attempts(
        &self,
        id: &OutboxId,
        error_message: String,
        now_ms: i64,
    ) -> Result<()> {
        let oid: i64 = id
            .as_str()
            .parse()
            .map_err(|_| StorageError::Invariant(format!("non-numeric outbox id {id}")))?;
        let result = sqlx::query(
            r#"
            UPDATE outbox SET
                attempts = attempts + 1,
                last_error = $2,
                next_retry_at_ms = $3 + (POWER(2, LEAST(attempts + 1, 20))::BIGINT * 1000)
            WHERE id = $1
            "#,
        )
        .bind(oid)
        .bind(error_message)
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: "outbox",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_token_budget(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        now_ms: i64,
    ) -> Result<Option<TokenBudget>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM token_budgets
            WHERE scope = $1 AND scope_id IS NOT DISTINCT FROM $2 AND period_end_ms > $3
            "#,
        )
        .bind(budget_scope_str(scope))
        .bind(scope_id)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(Self::row_to_budget).transpose()
    }

    async fn increment_token_usage(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        tokens: u64,
        now_ms: i64,
    ) -> Result<TokenBudget> {
        let row = sqlx::query(
            r#"
            UPDATE token_budgets SET used_tokens = used_tokens + $4
            WHERE scope = $1 AND scope_id IS NOT DISTINCT FROM $2 AND period_end_ms > $3
            RETURNING *
            "#,
        )
        .bind(budget_scope_str(scope))
        .bind(scope_id)
        .bind(now_ms)
        .bind(tokens as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StorageError::NotFound {
            kind: "token_budget",
            id: scope_id.unwrap_or("global").to_string(),
        })?;
        Self::row_to_budget(&row)
    }

    async fn get_expired_budgets(&self, now_ms: i64) -> Result<Vec<TokenBudget>> {
        let rows = sqlx::query("SELECT * FROM token_budgets WHERE period_end_ms <= $1")
            .bind(now_ms)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_budget).collect()
    }

    async fn create_budget_period(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        limit_tokens: u64,
        granularity: PeriodGranularity,
        period_start_ms: i64,
    ) -> Result<TokenBudget> {
        let period_end_ms = period_start_ms + granularity.duration_ms();
        let row = sqlx::query(
            r#"
            INSERT INTO token_budgets
                (scope, scope_id, limit_tokens, period_granularity, period_start_ms, period_end_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (scope, scope_id, period_start_ms) DO UPDATE SET scope = EXCLUDED.scope
            RETURNING *
            "#,
        )
        .bind(budget_scope_str(scope))
        .bind(scope_id)
        .bind(limit_tokens as i64)
        .bind(granularity_str(granularity))
        .bind(period_start_ms)
        .bind(period_end_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Self::row_to_budget(&row)
    }
}
