//! In-memory usage store.

use std::sync::Arc;

use tokio::sync::RwLock;

use switchboard_types::error::RepositoryError;
use switchboard_types::usage::{TimeRange, UsageRecord, UsageStats};

use super::store::UsageStore;

/// Append-only `Vec` of usage records behind an async `RwLock`.
///
/// Readers copy matching records out and aggregate after releasing the lock,
/// so a stats query holds the lock only for the scan.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUsageStore {
    records: Arc<RwLock<Vec<UsageRecord>>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Every record appended so far, oldest first.
    pub async fn all(&self) -> Vec<UsageRecord> {
        self.records.read().await.clone()
    }
}

impl UsageStore for InMemoryUsageStore {
    async fn append(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(&self, range: TimeRange) -> Result<UsageStats, RepositoryError> {
        let matching = self.records(range).await?;
        Ok(UsageStats::from_records(range, &matching))
    }

    async fn records(&self, range: TimeRange) -> Result<Vec<UsageRecord>, RepositoryError> {
        let guard = self.records.read().await;
        Ok(guard
            .iter()
            .filter(|r| range.contains(r.timestamp))
            .cloned()
            .collect())
    }
}
