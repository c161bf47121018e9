//! Concurrent quota tracker.
//!
//! Holds one [`ProviderQuota`] per provider id inside a `DashMap`. Every
//! mutation goes through the map's entry guard, so operations on one provider
//! are serialized while different providers proceed independently.
//!
//! Once a registry has registered its provider ids, entries are only created
//! for those ids. The membership check runs under the entry guard, so a
//! reservation racing a reload can never resurrect a removed provider.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::time::Instant;

use switchboard_types::provider::{Provider, ProviderStatus};

use super::window::{ProviderQuota, Rejection};

/// Point-in-time view of one provider's quota, for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub provider_id: String,
    pub status: ProviderStatus,
    pub request_count: u64,
    pub token_count: u64,
    pub window_remaining_ms: u64,
}

/// Owner of all per-provider quota windows and statuses.
///
/// Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct QuotaTracker {
    entries: Arc<DashMap<String, ProviderQuota>>,
    /// Configured ids; `None` until a registry registers its providers.
    registered: Arc<ArcSwapOption<HashSet<String>>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve one request and `estimated_tokens` for `provider`.
    ///
    /// The window entry is created on first use. Limits are read from the
    /// `provider` passed in, so a reloaded config applies immediately.
    /// Providers removed by a reload are rejected as `Unregistered`.
    pub fn try_reserve(
        &self,
        provider: &Provider,
        estimated_tokens: u64,
    ) -> Result<Reservation, Rejection> {
        let now = Instant::now();
        let generation = match self.entries.entry(provider.id.clone()) {
            Entry::Occupied(mut entry) => {
                entry
                    .get_mut()
                    .try_reserve(now, provider, estimated_tokens)?
            }
            Entry::Vacant(entry) => {
                if !self.is_registered(&provider.id) {
                    return Err(Rejection::Unregistered);
                }
                entry
                    .insert(ProviderQuota::new(now))
                    .value_mut()
                    .try_reserve(now, provider, estimated_tokens)?
            }
        };

        tracing::trace!(
            provider = %provider.id,
            estimated_tokens,
            generation,
            "Reserved quota"
        );

        Ok(Reservation {
            entries: Arc::clone(&self.entries),
            provider_id: provider.id.clone(),
            estimated_tokens,
            generation,
            settled: false,
        })
    }

    /// Replace the reservation's estimate with actual usage.
    pub fn commit(&self, reservation: Reservation, actual_tokens: u64) {
        reservation.commit(actual_tokens);
    }

    /// Back an unused reservation out of the counters.
    pub fn release(&self, reservation: Reservation) {
        reservation.release();
    }

    /// Move a provider to `Throttled` until its next window rollover.
    pub fn mark_throttled(&self, provider_id: &str) {
        let now = Instant::now();
        self.with_entry(provider_id, now, |quota| quota.mark_throttled(now));
    }

    /// Move a provider to `CoolingDown` for `duration`.
    pub fn mark_cooling_down(&self, provider_id: &str, duration: Duration) {
        let now = Instant::now();
        self.with_entry(provider_id, now, |quota| {
            quota.mark_cooling_down(now, duration)
        });
    }

    /// Operator action: take a provider out of rotation until cleared.
    pub fn disable(&self, provider_id: &str) {
        self.with_entry(provider_id, Instant::now(), ProviderQuota::disable);
    }

    /// Return a provider to `Active` from any status.
    pub fn clear(&self, provider_id: &str) {
        self.with_entry(provider_id, Instant::now(), ProviderQuota::clear);
    }

    /// Current status; providers never seen are `Active`.
    pub fn status(&self, provider_id: &str) -> ProviderStatus {
        self.entries
            .get(provider_id)
            .map(|quota| quota.status_at(Instant::now()))
            .unwrap_or(ProviderStatus::Active)
    }

    /// Counters for every tracked provider as they read right now.
    pub fn snapshot(&self) -> Vec<QuotaSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<QuotaSnapshot> = self
            .entries
            .iter()
            .map(|entry| {
                let window = entry.window.rolled(now);
                QuotaSnapshot {
                    provider_id: entry.key().clone(),
                    status: entry.status_at(now),
                    request_count: window.request_count,
                    token_count: window.token_count,
                    window_remaining_ms: window.remaining(now).as_millis() as u64,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        snapshots
    }

    /// Record the configured provider ids and drop state for every other id.
    ///
    /// The new id set is published before the sweep, so a concurrent
    /// reservation either sees it or is swept afterwards.
    pub fn register_ids<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let keep: Arc<HashSet<String>> = Arc::new(ids.into_iter().map(str::to_string).collect());
        self.registered.store(Some(Arc::clone(&keep)));
        self.entries.retain(|id, _| keep.contains(id));
    }

    fn is_registered(&self, provider_id: &str) -> bool {
        match &*self.registered.load() {
            Some(ids) => ids.contains(provider_id),
            None => true,
        }
    }

    fn with_entry(&self, provider_id: &str, now: Instant, f: impl FnOnce(&mut ProviderQuota)) {
        match self.entries.entry(provider_id.to_string()) {
            Entry::Occupied(mut entry) => f(entry.get_mut()),
            Entry::Vacant(entry) => {
                if self.is_registered(provider_id) {
                    f(entry.insert(ProviderQuota::new(now)).value_mut());
                } else {
                    tracing::debug!(provider = %provider_id, "Ignoring status change for unregistered provider");
                }
            }
        }
    }
}

/// A provisional hold on one request and an estimated token count.
///
/// Settle it with [`Reservation::commit`] or [`Reservation::release`].
/// Dropping an unsettled reservation releases it, so an aborted provider call
/// never leaks quota.
#[derive(Debug)]
#[must_use = "an unsettled reservation is released on drop"]
pub struct Reservation {
    entries: Arc<DashMap<String, ProviderQuota>>,
    provider_id: String,
    estimated_tokens: u64,
    generation: u64,
    settled: bool,
}

impl Reservation {
    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    /// Replace the estimate with `actual_tokens`; the request stays counted.
    pub fn commit(mut self, actual_tokens: u64) {
        self.settled = true;
        if let Some(mut quota) = self.entries.get_mut(&self.provider_id) {
            quota.commit(
                Instant::now(),
                self.generation,
                self.estimated_tokens,
                actual_tokens,
            );
        }
    }

    /// Remove the request and the estimate from the window.
    pub fn release(mut self) {
        self.settled = true;
        self.release_counts();
    }

    fn release_counts(&self) {
        if let Some(mut quota) = self.entries.get_mut(&self.provider_id) {
            quota.release(Instant::now(), self.generation, self.estimated_tokens);
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(provider = %self.provider_id, "Releasing abandoned reservation");
            self.release_counts();
        }
    }
}
