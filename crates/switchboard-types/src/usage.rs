//! Usage log records and their aggregates.
//!
//! `UsageRecord` is the persisted, append-only schema consumed read-only by
//! dashboards and audit tooling. `UsageStats` is always derived from records,
//! never stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::ErrorClass;
use crate::provider::TaskType;

/// One completed dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub provider_id: String,
    pub task_type: TaskType,
    pub tokens_used: u64,
    pub success: bool,
    pub latency_ms: u64,
    pub error_kind: Option<ErrorClass>,
}

impl UsageRecord {
    /// Record for an attempt that produced a response.
    pub fn success(
        provider_id: impl Into<String>,
        task_type: TaskType,
        tokens_used: u64,
        latency_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider_id: provider_id.into(),
            task_type,
            tokens_used,
            success: true,
            latency_ms,
            error_kind: None,
        }
    }

    /// Record for an attempt that ended in a classified error.
    pub fn failure(
        provider_id: impl Into<String>,
        task_type: TaskType,
        latency_ms: u64,
        error_kind: ErrorClass,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider_id: provider_id.into(),
            task_type,
            tokens_used: 0,
            success: false,
            latency_ms,
            error_kind: Some(error_kind),
        }
    }
}

/// Half-open time range `[start, end)` for usage queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The range ending now and reaching back `window`.
    pub fn last(window: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - window,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Aggregated usage for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub tokens_used: u64,
    pub latency_p50_ms: u64,
    pub latency_p95_ms: u64,
    pub latency_p99_ms: u64,
    /// Failure counts keyed by error class.
    pub error_kinds: BTreeMap<String, u64>,
}

/// Aggregated usage over a time range, grouped by provider id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub range: Option<TimeRange>,
    pub providers: BTreeMap<String, ProviderUsage>,
    pub total_requests: u64,
    pub total_tokens: u64,
}

impl UsageStats {
    /// Aggregate records that fall inside `range`.
    ///
    /// Percentiles use the nearest-rank method over each provider's latencies.
    pub fn from_records<'a>(
        range: TimeRange,
        records: impl IntoIterator<Item = &'a UsageRecord>,
    ) -> Self {
        let mut providers: BTreeMap<String, ProviderUsage> = BTreeMap::new();
        let mut latencies: HashMap<String, Vec<u64>> = HashMap::new();

        for record in records.into_iter().filter(|r| range.contains(r.timestamp)) {
            let usage = providers.entry(record.provider_id.clone()).or_default();
            usage.requests += 1;
            usage.tokens_used += record.tokens_used;
            if record.success {
                usage.successes += 1;
            } else {
                usage.failures += 1;
            }
            if let Some(kind) = record.error_kind {
                *usage.error_kinds.entry(kind.to_string()).or_default() += 1;
            }
            latencies
                .entry(record.provider_id.clone())
                .or_default()
                .push(record.latency_ms);
        }

        for (id, mut samples) in latencies {
            samples.sort_unstable();
            if let Some(usage) = providers.get_mut(&id) {
                usage.latency_p50_ms = percentile(&samples, 50);
                usage.latency_p95_ms = percentile(&samples, 95);
                usage.latency_p99_ms = percentile(&samples, 99);
            }
        }

        let total_requests = providers.values().map(|u| u.requests).sum();
        let total_tokens = providers.values().map(|u| u.tokens_used).sum();

        Self {
            range: Some(range),
            providers,
            total_requests,
            total_tokens,
        }
    }
}

/// Nearest-rank percentile of an already sorted slice.
fn percentile(sorted: &[u64], pct: u64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len() as u64).div_ceil(100).max(1) as usize;
    sorted[rank.min(sorted.len()) - 1]
}
