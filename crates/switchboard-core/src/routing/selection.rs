//! Candidate selection.
//!
//! A strategy only reorders the registry's candidate list. The walk that
//! follows is the same for every strategy: skip attempted ids, skip providers
//! that are not `Active`, and take the first one whose quota reservation
//! succeeds.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::time::Instant;

use switchboard_types::config::SelectionStrategy;
use switchboard_types::error::{FailureReason, ProviderFailure};
use switchboard_types::provider::Provider;

use crate::quota::{QuotaTracker, Rejection, Reservation};

/// Outcome of one [`SelectionPolicy::select_next`] walk.
#[derive(Debug, Default)]
pub struct Selection {
    /// The provider to call next, with quota already reserved.
    pub chosen: Option<(Provider, Reservation)>,
    /// Providers passed over during this walk and why.
    pub skipped: Vec<ProviderFailure>,
    /// Providers whose local window filled up during this walk.
    /// They have already been marked `Throttled`.
    pub newly_throttled: Vec<String>,
}

/// Picks the next provider to attempt.
#[derive(Debug)]
pub struct SelectionPolicy {
    tracker: QuotaTracker,
    strategy: SelectionStrategy,
    cursor: AtomicUsize,
    last_used: DashMap<String, Instant>,
}

impl SelectionPolicy {
    pub fn new(tracker: QuotaTracker, strategy: SelectionStrategy) -> Self {
        Self {
            tracker,
            strategy,
            cursor: AtomicUsize::new(0),
            last_used: DashMap::new(),
        }
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Walk `candidates` and reserve quota on the first eligible provider.
    ///
    /// `preferred` names a provider to try before the strategy's order; it is
    /// ignored when it is not among the candidates.
    ///
    /// `rotation` is the request's round-robin offset. Pass `None` on the
    /// first pick; it is filled in and must be passed back on failovers so
    /// the request keeps its own rotation while other requests advance the
    /// shared cursor.
    pub fn select_next(
        &self,
        candidates: &[Provider],
        attempted: &HashSet<String>,
        estimated_tokens: u64,
        preferred: Option<&str>,
        rotation: &mut Option<usize>,
    ) -> Selection {
        let mut ordered = self.order(candidates, rotation);
        if let Some(id) = preferred {
            if let Some(pos) = ordered.iter().position(|p| p.id == id) {
                let provider = ordered.remove(pos);
                ordered.insert(0, provider);
            }
        }

        let mut selection = Selection::default();
        for provider in ordered {
            if attempted.contains(&provider.id) {
                continue;
            }

            match self.tracker.try_reserve(provider, estimated_tokens) {
                Ok(reservation) => {
                    if self.strategy == SelectionStrategy::LeastRecentlyUsed {
                        self.last_used.insert(provider.id.clone(), Instant::now());
                    }
                    selection.chosen = Some((provider.clone(), reservation));
                    return selection;
                }
                Err(Rejection::Unavailable(status)) => {
                    tracing::debug!(provider = %provider.id, %status, "Skipping unavailable provider");
                    selection.skipped.push(ProviderFailure {
                        provider_id: provider.id.clone(),
                        reason: FailureReason::Unavailable { status },
                    });
                }
                Err(Rejection::Unregistered) => {
                    tracing::debug!(provider = %provider.id, "Skipping provider removed by reload");
                }
                Err(Rejection::QuotaFull { exhausted }) => {
                    tracing::debug!(
                        provider = %provider.id,
                        estimated_tokens,
                        exhausted,
                        "Skipping provider with full quota window"
                    );
                    if exhausted {
                        self.tracker.mark_throttled(&provider.id);
                        selection.newly_throttled.push(provider.id.clone());
                    }
                    selection.skipped.push(ProviderFailure {
                        provider_id: provider.id.clone(),
                        reason: FailureReason::QuotaFull,
                    });
                }
            }
        }

        selection
    }

    fn order<'a>(
        &self,
        candidates: &'a [Provider],
        rotation: &mut Option<usize>,
    ) -> Vec<&'a Provider> {
        let mut ordered: Vec<&Provider> = candidates.iter().collect();
        match self.strategy {
            SelectionStrategy::Priority => {}
            SelectionStrategy::RoundRobin => {
                if !ordered.is_empty() {
                    // Advance the cursor once per request.
                    let offset =
                        *rotation.get_or_insert_with(|| self.cursor.fetch_add(1, Ordering::Relaxed));
                    let len = ordered.len();
                    ordered.rotate_left(offset % len);
                }
            }
            SelectionStrategy::LeastRecentlyUsed => {
                // Stable sort: never-used first, ties keep priority order.
                ordered.sort_by_key(|p| self.last_used.get(&p.id).map(|at| *at));
            }
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    use switchboard_types::provider::ProviderStatus;

    fn provider(id: &str, rpm: u64) -> Provider {
        Provider {
            id: id.to_string(),
            tier: 0,
            rpm_limit: rpm,
            tpm_limit: 100_000,
            buffer_percent: 100,
            task_affinities: BTreeSet::new(),
            model: "m".to_string(),
            endpoint: "e".to_string(),
            auth_ref: None,
        }
    }

    fn chosen_id(selection: &Selection) -> Option<&str> {
        selection.chosen.as_ref().map(|(p, _)| p.id.as_str())
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_picks_first_eligible() {
        let tracker = QuotaTracker::new();
        let policy = SelectionPolicy::new(tracker.clone(), SelectionStrategy::Priority);
        let candidates = vec![provider("a", 10), provider("b", 10)];

        let selection = policy.select_next(&candidates, &HashSet::new(), 10, None, &mut None);
        assert_eq!(chosen_id(&selection), Some("a"));
        assert!(selection.skipped.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_attempted_and_unavailable() {
        let tracker = QuotaTracker::new();
        let policy = SelectionPolicy::new(tracker.clone(), SelectionStrategy::Priority);
        let candidates = vec![provider("a", 10), provider("b", 10), provider("c", 10)];

        tracker.mark_cooling_down("b", Duration::from_secs(60));
        let attempted: HashSet<String> = ["a".to_string()].into();

        let selection = policy.select_next(&candidates, &attempted, 10, None, &mut None);
        assert_eq!(chosen_id(&selection), Some("c"));
        assert_eq!(
            selection.skipped,
            vec![ProviderFailure {
                provider_id: "b".to_string(),
                reason: FailureReason::Unavailable {
                    status: ProviderStatus::CoolingDown
                },
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_window_marks_throttled() {
        let tracker = QuotaTracker::new();
        let policy = SelectionPolicy::new(tracker.clone(), SelectionStrategy::Priority);
        let candidates = vec![provider("a", 1), provider("b", 10)];

        let first = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        let (_, reservation) = first.chosen.unwrap();
        reservation.commit(1);

        let second = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        assert_eq!(chosen_id(&second), Some("b"));
        assert_eq!(second.newly_throttled, vec!["a".to_string()]);
        assert_eq!(tracker.status("a"), ProviderStatus::Throttled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_none_with_reasons() {
        let tracker = QuotaTracker::new();
        let policy = SelectionPolicy::new(tracker.clone(), SelectionStrategy::Priority);
        let candidates = vec![provider("a", 10), provider("b", 10)];
        tracker.mark_throttled("a");
        tracker.disable("b");

        let selection = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        assert!(selection.chosen.is_none());
        let ids: Vec<&str> = selection.skipped.iter().map(|f| f.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preferred_goes_first() {
        let policy = SelectionPolicy::new(QuotaTracker::new(), SelectionStrategy::Priority);
        let candidates = vec![provider("a", 10), provider("b", 10)];

        let selection = policy.select_next(&candidates, &HashSet::new(), 1, Some("b"), &mut None);
        assert_eq!(chosen_id(&selection), Some("b"));

        let selection = policy.select_next(&candidates, &HashSet::new(), 1, Some("missing"), &mut None);
        assert_eq!(chosen_id(&selection), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_robin_rotates_per_request() {
        let policy = SelectionPolicy::new(QuotaTracker::new(), SelectionStrategy::RoundRobin);
        let candidates = vec![provider("a", 100), provider("b", 100), provider("c", 100)];

        let mut picks = Vec::new();
        for _ in 0..4 {
            let selection = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
            picks.push(chosen_id(&selection).unwrap().to_string());
        }
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_robin_failover_keeps_rotation() {
        let policy = SelectionPolicy::new(QuotaTracker::new(), SelectionStrategy::RoundRobin);
        let candidates = vec![provider("a", 100), provider("b", 100), provider("c", 100)];

        policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        let mut rotation = None;
        let first = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut rotation);
        assert_eq!(chosen_id(&first), Some("b"));
        assert_eq!(rotation, Some(1));

        // Concurrent requests advance the shared cursor in between.
        for _ in 0..2 {
            policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        }

        let attempted: HashSet<String> = ["b".to_string()].into();
        let failover = policy.select_next(&candidates, &attempted, 1, None, &mut rotation);
        assert_eq!(chosen_id(&failover), Some("c"));

        let attempted: HashSet<String> = ["b".to_string(), "c".to_string()].into();
        let last = policy.select_next(&candidates, &attempted, 1, None, &mut rotation);
        assert_eq!(chosen_id(&last), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_used_prefers_idle_provider() {
        let policy =
            SelectionPolicy::new(QuotaTracker::new(), SelectionStrategy::LeastRecentlyUsed);
        let candidates = vec![provider("a", 100), provider("b", 100)];

        let first = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        assert_eq!(chosen_id(&first), Some("a"));

        tokio::time::advance(Duration::from_millis(10)).await;
        let second = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        assert_eq!(chosen_id(&second), Some("b"));

        tokio::time::advance(Duration::from_millis(10)).await;
        let third = policy.select_next(&candidates, &HashSet::new(), 1, None, &mut None);
        assert_eq!(chosen_id(&third), Some("a"));
    }
}
