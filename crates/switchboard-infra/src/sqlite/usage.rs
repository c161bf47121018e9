//! SQLite usage store implementation.
//!
//! Implements `UsageStore` from `switchboard-core`. Appends go through the
//! single-connection writer pool; range queries read from the reader pool and
//! aggregate in memory with `UsageStats::from_records`.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use switchboard_core::usage::UsageStore;
use switchboard_types::error::{ErrorClass, RepositoryError};
use switchboard_types::provider::TaskType;
use switchboard_types::usage::{TimeRange, UsageRecord, UsageStats};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `UsageStore`.
#[derive(Debug, Clone)]
pub struct SqliteUsageStore {
    pool: DatabasePool,
}

impl SqliteUsageStore {
    /// Create a new usage store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct UsageRow {
    timestamp: String,
    provider_id: String,
    task_type: String,
    tokens_used: i64,
    success: bool,
    latency_ms: i64,
    error_kind: Option<String>,
}

impl UsageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            timestamp: row.try_get("timestamp")?,
            provider_id: row.try_get("provider_id")?,
            task_type: row.try_get("task_type")?,
            tokens_used: row.try_get("tokens_used")?,
            success: row.try_get("success")?,
            latency_ms: row.try_get("latency_ms")?,
            error_kind: row.try_get("error_kind")?,
        })
    }

    fn into_record(self) -> Result<UsageRecord, RepositoryError> {
        let task_type: TaskType = self
            .task_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(format!("invalid task_type: {e}")))?;
        let error_kind = self
            .error_kind
            .map(|kind| kind.parse::<ErrorClass>())
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid error_kind: {e}")))?;

        Ok(UsageRecord {
            timestamp: parse_datetime(&self.timestamp)?,
            provider_id: self.provider_id,
            task_type,
            tokens_used: self.tokens_used.max(0) as u64,
            success: self.success,
            latency_ms: self.latency_ms.max(0) as u64,
            error_kind,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC form so that string order matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// UsageStore implementation
// ---------------------------------------------------------------------------

impl UsageStore for SqliteUsageStore {
    async fn append(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO usage_records
               (timestamp, provider_id, task_type, tokens_used, success, latency_ms, error_kind)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(format_datetime(&record.timestamp))
        .bind(&record.provider_id)
        .bind(record.task_type.to_string())
        .bind(to_sql_count(record.tokens_used))
        .bind(record.success)
        .bind(to_sql_count(record.latency_ms))
        .bind(record.error_kind.map(|kind| kind.to_string()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, range: TimeRange) -> Result<UsageStats, RepositoryError> {
        let records = self.records(range).await?;
        Ok(UsageStats::from_records(range, &records))
    }

    async fn records(&self, range: TimeRange) -> Result<Vec<UsageRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT timestamp, provider_id, task_type, tokens_used, success, latency_ms, error_kind
               FROM usage_records
               WHERE timestamp >= ? AND timestamp < ?
               ORDER BY id ASC"#,
        )
        .bind(format_datetime(&range.start))
        .bind(format_datetime(&range.end))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let usage_row =
                UsageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(usage_row.into_record()?);
        }

        Ok(records)
    }
}
