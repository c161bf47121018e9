//! Router configuration types.
//!
//! `SwitchboardConfig` mirrors the `switchboard.toml` file: a `[router]`
//! table of dispatcher tunables plus a `[[providers]]` array. Every router
//! setting has a documented default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::provider::{Provider, validate_providers};

/// Candidate ordering strategy used by the selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Affinity group first, then tier ascending.
    #[default]
    Priority,
    /// Rotate the starting candidate on every selection.
    RoundRobin,
    /// Prefer the candidate that was selected longest ago.
    LeastRecentlyUsed,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::Priority => write!(f, "priority"),
            SelectionStrategy::RoundRobin => write!(f, "round_robin"),
            SelectionStrategy::LeastRecentlyUsed => write!(f, "least_recently_used"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "priority" => Ok(SelectionStrategy::Priority),
            "round_robin" => Ok(SelectionStrategy::RoundRobin),
            "least_recently_used" | "lru" => Ok(SelectionStrategy::LeastRecentlyUsed),
            other => Err(format!("invalid selection strategy: '{other}'")),
        }
    }
}

/// Dispatcher tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Retries on the same provider after a transient error.
    #[serde(default = "default_max_retries_per_provider")]
    pub max_retries_per_provider: u32,
    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Randomize each delay within its upper half.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// How long a provider stays in cool-down after a fatal error.
    #[serde(default = "default_cool_down_secs")]
    pub cool_down_secs: u64,
    /// Deadline applied to requests that do not carry one.
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,
    /// Broadcast channel capacity for lifecycle events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub strategy: SelectionStrategy,
}

fn default_max_retries_per_provider() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

fn default_jitter() -> bool {
    true
}

fn default_cool_down_secs() -> u64 {
    60
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_event_capacity() -> usize {
    256
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_retries_per_provider: default_max_retries_per_provider(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            jitter: default_jitter(),
            cool_down_secs: default_cool_down_secs(),
            default_deadline_ms: default_deadline_ms(),
            event_capacity: default_event_capacity(),
            strategy: SelectionStrategy::default(),
        }
    }
}

impl RouterSettings {
    pub fn cool_down(&self) -> Duration {
        Duration::from_secs(self.cool_down_secs)
    }

    pub fn default_deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms)
    }

    /// Reject settings that would make dispatch misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::InvalidSetting(format!(
                "backoff_max_ms ({}) is below backoff_base_ms ({})",
                self.backoff_max_ms, self.backoff_base_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidSetting(
                "event_capacity must be positive".to_string(),
            ));
        }
        if self.default_deadline_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "default_deadline_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level contents of `switchboard.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub providers: Vec<Provider>,
}

impl SwitchboardConfig {
    /// Validate router settings and the provider set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.router.validate()?;
        validate_providers(&self.providers)
    }
}
