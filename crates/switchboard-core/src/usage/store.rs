//! Usage store trait definition.
//!
//! Defines the append-only storage interface for per-attempt usage records.
//! The infrastructure layer (switchboard-infra) implements this trait with
//! SQLite persistence; [`super::InMemoryUsageStore`] serves tests and
//! embedders that do not need durability.

use switchboard_types::error::RepositoryError;
use switchboard_types::usage::{TimeRange, UsageRecord, UsageStats};

/// Repository trait for usage record persistence.
///
/// Records are never updated or deleted once appended.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait UsageStore: Send + Sync {
    /// Durably append one record. Returns once the record is stored.
    fn append(
        &self,
        record: &UsageRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Aggregate records inside `range`, grouped by provider id.
    fn query(
        &self,
        range: TimeRange,
    ) -> impl std::future::Future<Output = Result<UsageStats, RepositoryError>> + Send;

    /// Raw records inside `range`, oldest first.
    fn records(
        &self,
        range: TimeRange,
    ) -> impl std::future::Future<Output = Result<Vec<UsageRecord>, RepositoryError>> + Send;
}
