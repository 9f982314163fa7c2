// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token budgets and resource quotas.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    Global,
    Project,
    Runner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl PeriodGranularity {
    /// Length of one period in milliseconds. Months are treated as a fixed
    /// 30-day window — the rollover task only needs "far enough in the
    /// future to not double-fire", not calendar-accurate month boundaries.
    pub fn duration_ms(&self) -> i64 {
        const SEC: i64 = 1000;
        const MIN: i64 = 60 * SEC;
        const HOUR: i64 = 60 * MIN;
        const DAY: i64 = 24 * HOUR;
        match self {
            PeriodGranularity::Hourly => HOUR,
            PeriodGranularity::Daily => DAY,
            PeriodGranularity::Weekly => 7 * DAY,
            PeriodGranularity::Monthly => 30 * DAY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudget {
    pub scope: BudgetScope,
    #[serde(default)]
    pub scope_id: Option<String>,
    pub limit_tokens: u64,
    pub used_tokens: u64,
    pub period_granularity: PeriodGranularity,
    pub period_start_ms: i64,
    pub period_end_ms: i64,
}

/// Percentage thresholds that trigger a budget-warning notification,
/// evaluated on the post-increment percentage (spec.md §4.4).
pub const WARNING_THRESHOLDS: [(u8, &str); 2] = [(75, "high"), (90, "urgent")];

impl TokenBudget {
    pub fn new(
        scope: BudgetScope,
        scope_id: Option<String>,
        limit_tokens: u64,
        period_granularity: PeriodGranularity,
        period_start_ms: i64,
    ) -> Self {
        let period_end_ms = period_start_ms + period_granularity.duration_ms();
        Self {
            scope,
            scope_id,
            limit_tokens,
            used_tokens: 0,
            period_granularity,
            period_start_ms,
            period_end_ms,
        }
    }

    pub fn is_active(&self, now_ms: i64) -> bool {
        self.period_end_ms > now_ms
    }

    pub fn remaining(&self) -> u64 {
        self.limit_tokens.saturating_sub(self.used_tokens)
    }

    /// Would charging `estimated` tokens exceed the limit?
    pub fn would_exceed(&self, estimated: u64) -> bool {
        self.used_tokens.saturating_add(estimated) > self.limit_tokens
    }

    fn usage_percent(used: u64, limit: u64) -> u8 {
        if limit == 0 {
            return 100;
        }
        ((used as u128 * 100) / limit as u128).min(100) as u8
    }

    /// Returns the highest warning threshold crossed by adding `delta`
    /// tokens to `used_tokens`, i.e. a threshold that was not yet crossed
    /// before the increment but is crossed after it. `None` if no new
    /// threshold was crossed.
    pub fn warning_crossed_by(&self, delta: u64) -> Option<(u8, &'static str)> {
        let before = Self::usage_percent(self.used_tokens, self.limit_tokens);
        let after = Self::usage_percent(self.used_tokens.saturating_add(delta), self.limit_tokens);
        WARNING_THRESHOLDS
            .into_iter()
            .filter(|(pct, _)| before < *pct && after >= *pct)
            .next_back()
    }

    /// Record the charge. Callers apply `warning_crossed_by` *before*
    /// calling this so the before/after comparison sees the pre-increment
    /// state.
    pub fn record_usage(&mut self, delta: u64) {
        self.used_tokens = self.used_tokens.saturating_add(delta);
    }

    /// Compute the next period's (start, end) once this one has elapsed,
    /// landing exactly on the period containing `now_ms` — intermediate
    /// periods are never materialized (spec.md §4.4 rollover).
    pub fn next_period(&self, now_ms: i64) -> (i64, i64) {
        let duration = self.period_granularity.duration_ms();
        let mut start = self.period_start_ms + duration;
        while start + duration <= now_ms {
            start += duration;
        }
        (start, start + duration)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub project_name: String,
    pub max_concurrent_runners: u32,
    #[serde(default)]
    pub max_memory_mb: Option<u32>,
    #[serde(default)]
    pub max_cpu_percent: Option<f32>,
    #[serde(default)]
    pub max_daily_tokens: Option<u64>,
}

impl ResourceQuota {
    pub fn unlimited(project_name: impl Into<String>, max_concurrent_runners: u32) -> Self {
        Self {
            project_name: project_name.into(),
            max_concurrent_runners,
            max_memory_mb: None,
            max_cpu_percent: None,
            max_daily_tokens: None,
        }
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
