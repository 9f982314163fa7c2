// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Budget enforcer (spec.md §4.4): pre-charge checks, post-charge usage
//! recording with threshold warnings, and period rollover.

use crate::error::{EngineError, Result};
use crate::metrics::DaemonMetrics;
use oj_adapters::{NotifyAdapter, NotifyPriority};
use oj_core::{BudgetScope, Clock, DomainEvent, PeriodGranularity};
use oj_storage::StateStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub struct BudgetEnforcer<S, N, C> {
    store: Arc<S>,
    notify: N,
    clock: C,
    metrics: Arc<DaemonMetrics>,
}

impl<S, N, C> BudgetEnforcer<S, N, C>
where
    S: StateStore,
    N: NotifyAdapter,
    C: Clock,
{
    pub fn new(store: Arc<S>, notify: N, clock: C, metrics: Arc<DaemonMetrics>) -> Self {
        Self { store, notify, clock, metrics }
    }

    /// `CheckBudget`: every applicable scope (global, then project) must
    /// accommodate `estimated_tokens` without exceeding its limit. A scope
    /// with no active budget row is unlimited.
    pub async fn check_budget(&self, project_name: &str, estimated_tokens: u64) -> Result<()> {
        let now_ms = self.clock.now_ms();
        for (scope, scope_id) in [
            (BudgetScope::Global, None),
            (BudgetScope::Project, Some(project_name)),
        ] {
            if let Some(budget) = self.store.get_token_budget(scope, scope_id, now_ms).await? {
                if budget.would_exceed(estimated_tokens) {
                    self.metrics.budget_checks_rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(EngineError::BudgetExceeded {
                        scope,
                        scope_id: scope_id.map(str::to_string),
                        used: budget.used_tokens,
                        requested: estimated_tokens,
                        limit: budget.limit_tokens,
                    });
                }
            }
        }
        Ok(())
    }

    /// `RecordUsage`: atomically increments the current period's
    /// `used_tokens`, firing a notification if a warning threshold (75%,
    /// 90%) is crossed as a result.
    pub async fn record_usage(&self, scope: BudgetScope, scope_id: Option<&str>, tokens: u64) -> Result<()> {
        let now_ms = self.clock.now_ms();
        let before = self.store.get_token_budget(scope, scope_id, now_ms).await?;
        let crossed = before.as_ref().and_then(|b| b.warning_crossed_by(tokens));

        self.store.increment_token_usage(scope, scope_id, tokens, now_ms).await?;

        if let Some((percent, label)) = crossed {
            let priority = match label {
                "urgent" => NotifyPriority::Urgent,
                _ => NotifyPriority::High,
            };
            let title = format!("Budget at {percent}%");
            let message = format!("{scope:?} budget{} crossed {percent}%", scope_id.map(|s| format!(" ({s})")).unwrap_or_default());
            if let Err(e) = self.notify.notify(&title, &message, priority).await {
                tracing::warn!(error = %e, "budget warning notification failed");
            }
            let ev = DomainEvent::BudgetWarning {
                scope: format!("{scope:?}").to_lowercase(),
                scope_id: scope_id.map(str::to_string),
                percent,
                priority: priority.as_str().to_string(),
            };
            let _ = self.store.record_event(&ev, 5, now_ms).await;
        }
        Ok(())
    }

    /// Rollover: materialize exactly one new budget row covering the
    /// period containing `now`, for every budget whose period has elapsed.
    /// Idempotent under the unique constraint on `(scope, scope_id,
    /// period_start)` — a concurrent caller's duplicate insert simply
    /// returns the existing row (spec.md §4.4).
    pub async fn rollover_expired(&self) -> Result<usize> {
        let now_ms = self.clock.now_ms();
        let expired = self.store.get_expired_budgets(now_ms).await?;
        let mut rolled = 0;
        for budget in expired {
            let (next_start, _next_end) = budget.next_period(now_ms);
            self.store
                .create_budget_period(
                    budget.scope,
                    budget.scope_id.as_deref(),
                    budget.limit_tokens,
                    budget.period_granularity,
                    next_start,
                )
                .await?;
            rolled += 1;
        }
        Ok(rolled)
    }

    /// Create the first budget row for a scope that has none yet.
    pub async fn create_budget(
        &self,
        scope: BudgetScope,
        scope_id: Option<&str>,
        limit_tokens: u64,
        granularity: PeriodGranularity,
    ) -> Result<()> {
        let now_ms = self.clock.now_ms();
        self.store
            .create_budget_period(scope, scope_id, limit_tokens, granularity, now_ms)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
