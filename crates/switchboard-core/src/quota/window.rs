//! Per-provider quota window and routing status.
//!
//! Each provider owns exactly one [`QuotaWindow`] and one status. Both are
//! only ever mutated through [`ProviderQuota`] while the tracker holds the
//! provider's map entry, so every transition below runs serialized.

use std::time::Duration;

use tokio::time::Instant;

use switchboard_types::provider::{Provider, ProviderStatus};

/// Length of one accounting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Request and token counters for the current 60-second window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub window_start: Instant,
    pub request_count: u64,
    pub token_count: u64,
    /// Incremented once per rollover; ties reservations to their window.
    pub generation: u64,
}

impl QuotaWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            request_count: 0,
            token_count: 0,
            generation: 0,
        }
    }

    /// The window as it would look at `now`, without mutating anything.
    ///
    /// When `now` has crossed `window_start + 60s`, counts are zero and the
    /// start is advanced to the latest boundary at or before `now`.
    pub fn rolled(&self, now: Instant) -> Self {
        let Some(elapsed) = now.checked_duration_since(self.window_start) else {
            return *self;
        };
        if elapsed < WINDOW {
            return *self;
        }
        let periods = (elapsed.as_nanos() / WINDOW.as_nanos()) as u64;
        Self {
            window_start: self.window_start + Duration::from_secs(WINDOW.as_secs() * periods),
            request_count: 0,
            token_count: 0,
            generation: self.generation + 1,
        }
    }

    /// Time left before the next rollover.
    pub fn remaining(&self, now: Instant) -> Duration {
        (self.window_start + WINDOW).saturating_duration_since(now)
    }
}

/// Internal status carrying the timer a status needs to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Active,
    Throttled,
    CoolingDown { until: Instant },
    Disabled,
}

impl StatusState {
    pub fn public(self) -> ProviderStatus {
        match self {
            StatusState::Active => ProviderStatus::Active,
            StatusState::Throttled => ProviderStatus::Throttled,
            StatusState::CoolingDown { .. } => ProviderStatus::CoolingDown,
            StatusState::Disabled => ProviderStatus::Disabled,
        }
    }
}

/// Outcome of a reservation attempt that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The provider is not `Active`.
    Unavailable(ProviderStatus),
    /// The request would overshoot a buffered cap.
    ///
    /// `exhausted` is true when the window is fully used (no further request
    /// of any size could fit), as opposed to one oversized estimate.
    QuotaFull { exhausted: bool },
    /// The provider is no longer configured.
    Unregistered,
}

/// Mutable quota state for one provider.
#[derive(Debug, Clone)]
pub struct ProviderQuota {
    pub window: QuotaWindow,
    pub status: StatusState,
}

impl ProviderQuota {
    pub fn new(now: Instant) -> Self {
        Self {
            window: QuotaWindow::new(now),
            status: StatusState::Active,
        }
    }

    /// Apply window rollover and timer-based recovery.
    ///
    /// Returns true when a window boundary was crossed.
    pub fn refresh(&mut self, now: Instant) -> bool {
        let rolled = self.window.rolled(now);
        let crossed = rolled.generation != self.window.generation;
        self.window = rolled;

        if crossed && self.status == StatusState::Throttled {
            self.status = StatusState::Active;
        }
        if let StatusState::CoolingDown { until } = self.status {
            if now >= until {
                self.status = StatusState::Active;
            }
        }

        crossed
    }

    /// The status as it would read at `now`, without mutating anything.
    pub fn status_at(&self, now: Instant) -> ProviderStatus {
        let mut view = self.clone();
        view.refresh(now);
        view.status.public()
    }

    /// Check-and-increment against the provider's buffered caps.
    ///
    /// Counters are untouched unless both caps hold. Returns the window
    /// generation the reservation belongs to.
    pub fn try_reserve(
        &mut self,
        now: Instant,
        provider: &Provider,
        estimated_tokens: u64,
    ) -> Result<u64, Rejection> {
        self.refresh(now);

        let status = self.status.public();
        if !status.is_routable() {
            return Err(Rejection::Unavailable(status));
        }

        let rpm_cap = provider.effective_rpm();
        let tpm_cap = provider.effective_tpm();
        let requests_fit = self.window.request_count < rpm_cap;
        let tokens_fit = self.window.token_count.saturating_add(estimated_tokens) <= tpm_cap;

        if !(requests_fit && tokens_fit) {
            let exhausted = self.window.request_count >= rpm_cap || self.window.token_count >= tpm_cap;
            return Err(Rejection::QuotaFull { exhausted });
        }

        self.window.request_count += 1;
        self.window.token_count += estimated_tokens;
        Ok(self.window.generation)
    }

    /// Replace a reservation's estimate with the actual token usage.
    ///
    /// No-op when the reservation's window has already rolled over.
    pub fn commit(&mut self, now: Instant, generation: u64, estimated: u64, actual: u64) {
        self.refresh(now);
        if self.window.generation != generation {
            return;
        }
        self.window.token_count = self
            .window
            .token_count
            .saturating_add(actual)
            .saturating_sub(estimated);
    }

    /// Back a reservation out of the counters, clamped at zero.
    ///
    /// No-op when the reservation's window has already rolled over.
    pub fn release(&mut self, now: Instant, generation: u64, estimated: u64) {
        self.refresh(now);
        if self.window.generation != generation {
            return;
        }
        self.window.request_count = self.window.request_count.saturating_sub(1);
        self.window.token_count = self.window.token_count.saturating_sub(estimated);
    }

    pub fn mark_throttled(&mut self, now: Instant) {
        self.refresh(now);
        if self.status != StatusState::Disabled {
            self.status = StatusState::Throttled;
        }
    }

    pub fn mark_cooling_down(&mut self, now: Instant, duration: Duration) {
        self.refresh(now);
        if self.status != StatusState::Disabled {
            self.status = StatusState::CoolingDown {
                until: now + duration,
            };
        }
    }

    pub fn disable(&mut self) {
        self.status = StatusState::Disabled;
    }

    pub fn clear(&mut self) {
        self.status = StatusState::Active;
    }
}
