//! Provider registry with atomic hot reload.
//!
//! Readers load an `Arc` snapshot and never observe a partially updated
//! provider list. Reloads validate first and swap the whole snapshot.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use switchboard_types::error::ConfigError;
use switchboard_types::provider::{Provider, ProviderStatus, TaskType, validate_providers};

use crate::quota::QuotaTracker;

/// An immutable view of the configured providers.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    pub providers: Vec<Provider>,
    /// Incremented on every successful reload.
    pub version: u64,
}

impl RegistrySnapshot {
    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }
}

/// Registry of configured providers, indexed by id.
///
/// Shares the [`QuotaTracker`] so that disabled providers are filtered out of
/// candidate lists and removed providers lose their quota state on reload.
pub struct ProviderRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
    tracker: QuotaTracker,
    reload_lock: Mutex<()>,
}

impl ProviderRegistry {
    /// Build a registry from an initial provider set.
    pub fn new(providers: Vec<Provider>, tracker: QuotaTracker) -> Result<Self, ConfigError> {
        validate_providers(&providers)?;
        tracker.register_ids(providers.iter().map(|p| p.id.as_str()));
        Ok(Self {
            snapshot: ArcSwap::from_pointee(RegistrySnapshot {
                providers,
                version: 0,
            }),
            tracker,
            reload_lock: Mutex::new(()),
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Look up a provider by id in the current snapshot.
    pub fn get(&self, id: &str) -> Option<Provider> {
        self.snapshot.load().get(id).cloned()
    }

    /// Candidates for `task_type`, best first.
    ///
    /// Providers with an affinity for the task come first, then the rest;
    /// each group is ordered by tier, then id. Disabled providers are left out.
    pub fn get_candidates(&self, task_type: TaskType) -> Vec<Provider> {
        let snapshot = self.snapshot.load();
        let mut candidates: Vec<Provider> = snapshot
            .providers
            .iter()
            .filter(|p| self.tracker.status(&p.id) != ProviderStatus::Disabled)
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            b.has_affinity(task_type)
                .cmp(&a.has_affinity(task_type))
                .then_with(|| a.tier.cmp(&b.tier))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }

    /// Atomically replace the provider set.
    ///
    /// All-or-nothing: on a validation error the current snapshot is kept.
    /// Surviving ids keep their quota windows and status; removed ids are
    /// dropped from the tracker.
    pub fn reload(&self, providers: Vec<Provider>) -> Result<u64, ConfigError> {
        validate_providers(&providers)?;

        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let version = self.snapshot.load().version + 1;
        let ids: Vec<String> = providers.iter().map(|p| p.id.clone()).collect();
        self.snapshot
            .store(Arc::new(RegistrySnapshot { providers, version }));
        self.tracker.register_ids(ids.iter().map(String::as_str));

        tracing::info!(version, providers = ids.len(), "Provider registry reloaded");
        Ok(version)
    }

    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("ProviderRegistry")
            .field("version", &snapshot.version)
            .field("providers", &snapshot.providers.len())
            .finish()
    }
}
