//! Provider configuration and status types.
//!
//! A [`Provider`] is an immutable configuration entry. Live status and quota
//! counters are owned by the quota tracker in `switchboard-core`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Caller-supplied classification used to bias provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Chat,
    Code,
    Creative,
    Analysis,
    General,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 5] = [
        TaskType::Chat,
        TaskType::Code,
        TaskType::Creative,
        TaskType::Analysis,
        TaskType::General,
    ];
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Chat => write!(f, "chat"),
            TaskType::Code => write!(f, "code"),
            TaskType::Creative => write!(f, "creative"),
            TaskType::Analysis => write!(f, "analysis"),
            TaskType::General => write!(f, "general"),
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(TaskType::Chat),
            "code" => Ok(TaskType::Code),
            "creative" => Ok(TaskType::Creative),
            "analysis" => Ok(TaskType::Analysis),
            "general" => Ok(TaskType::General),
            other => Err(format!("invalid task type: '{other}'")),
        }
    }
}

/// Routing status of a provider.
///
/// `Disabled` is the only state that requires operator action to leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Eligible for routing.
    Active,
    /// Quota exhausted; recovers at the next window rollover.
    Throttled,
    /// Fatal error observed; recovers when the cool-down timer elapses.
    CoolingDown,
    /// Operator-disabled until explicitly cleared.
    Disabled,
}

impl ProviderStatus {
    /// Whether a provider in this status may be selected.
    pub fn is_routable(self) -> bool {
        matches!(self, ProviderStatus::Active)
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStatus::Active => write!(f, "active"),
            ProviderStatus::Throttled => write!(f, "throttled"),
            ProviderStatus::CoolingDown => write!(f, "cooling_down"),
            ProviderStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl FromStr for ProviderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ProviderStatus::Active),
            "throttled" => Ok(ProviderStatus::Throttled),
            "cooling_down" => Ok(ProviderStatus::CoolingDown),
            "disabled" => Ok(ProviderStatus::Disabled),
            other => Err(format!("invalid provider status: '{other}'")),
        }
    }
}

/// Configuration for a single completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Unique identifier (e.g., "groq", "openrouter-free").
    pub id: String,
    /// Priority tier; lower = preferred.
    #[serde(default)]
    pub tier: u32,
    /// Hard requests-per-minute limit enforced by the provider.
    pub rpm_limit: u64,
    /// Hard tokens-per-minute limit enforced by the provider.
    pub tpm_limit: u64,
    /// Percentage of the hard limits that reservations may use (0-100).
    #[serde(default = "default_buffer_percent")]
    pub buffer_percent: u8,
    /// Task types this provider is preferred for.
    #[serde(default)]
    pub task_affinities: BTreeSet<TaskType>,
    /// Model identifier to request.
    pub model: String,
    /// Endpoint descriptor (usually a base URL).
    pub endpoint: String,
    /// Opaque credential handle, resolved by the transport.
    #[serde(default)]
    pub auth_ref: Option<String>,
}

fn default_buffer_percent() -> u8 {
    80
}

impl Provider {
    /// Requests allowed per window after applying the safety buffer.
    pub fn effective_rpm(&self) -> u64 {
        self.rpm_limit.saturating_mul(u64::from(self.buffer_percent)) / 100
    }

    /// Tokens allowed per window after applying the safety buffer.
    pub fn effective_tpm(&self) -> u64 {
        self.tpm_limit.saturating_mul(u64::from(self.buffer_percent)) / 100
    }

    /// Whether this provider is preferred for the given task type.
    pub fn has_affinity(&self, task_type: TaskType) -> bool {
        self.task_affinities.contains(&task_type)
    }
}

/// Validate a full provider set.
///
/// Checks for empty and duplicate ids, zero limits, and a buffer outside
/// 0-100. Returns the first violation found.
pub fn validate_providers(providers: &[Provider]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(providers.len());

    for provider in providers {
        if provider.id.trim().is_empty() {
            return Err(ConfigError::EmptyProviderId);
        }
        if !seen.insert(provider.id.as_str()) {
            return Err(ConfigError::DuplicateProvider(provider.id.clone()));
        }
        if provider.rpm_limit == 0 {
            return Err(ConfigError::NonPositiveLimit {
                provider: provider.id.clone(),
                field: "rpm_limit",
            });
        }
        if provider.tpm_limit == 0 {
            return Err(ConfigError::NonPositiveLimit {
                provider: provider.id.clone(),
                field: "tpm_limit",
            });
        }
        if provider.buffer_percent > 100 {
            return Err(ConfigError::InvalidBuffer {
                provider: provider.id.clone(),
                value: provider.buffer_percent,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            tier: 0,
            rpm_limit: 10,
            tpm_limit: 1000,
            buffer_percent: 80,
            task_affinities: BTreeSet::new(),
            model: "m".to_string(),
            endpoint: "https://example.invalid".to_string(),
            auth_ref: None,
        }
    }

    #[test]
    fn test_task_type_roundtrip() {
        for task in TaskType::ALL {
            let parsed: TaskType = task.to_string().parse().unwrap();
            assert_eq!(task, parsed);
        }
        assert!("poetry".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_provider_status_serde() {
        let json = serde_json::to_string(&ProviderStatus::CoolingDown).unwrap();
        assert_eq!(json, "\"cooling_down\"");
        let parsed: ProviderStatus = json.trim_matches('"').parse().unwrap();
        assert_eq!(parsed, ProviderStatus::CoolingDown);
    }

    #[test]
    fn test_only_active_is_routable() {
        assert!(ProviderStatus::Active.is_routable());
        assert!(!ProviderStatus::Throttled.is_routable());
        assert!(!ProviderStatus::CoolingDown.is_routable());
        assert!(!ProviderStatus::Disabled.is_routable());
    }

    #[test]
    fn test_effective_limits_apply_buffer() {
        let p = provider("x");
        assert_eq!(p.effective_rpm(), 8);
        assert_eq!(p.effective_tpm(), 800);
    }

    #[test]
    fn test_zero_buffer_blocks_everything() {
        let mut p = provider("x");
        p.buffer_percent = 0;
        assert_eq!(p.effective_rpm(), 0);
        assert_eq!(p.effective_tpm(), 0);
    }

    #[test]
    fn test_validate_accepts_good_set() {
        assert!(validate_providers(&[provider("a"), provider("b")]).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let err = validate_providers(&[provider("a"), provider("a")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProvider(id) if id == "a"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut p = provider("a");
        p.tpm_limit = 0;
        let err = validate_providers(&[p]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonPositiveLimit { field: "tpm_limit", .. }
        ));
    }

    #[test]
    fn test_validate_rejects_buffer_over_100() {
        let mut p = provider("a");
        p.buffer_percent = 101;
        let err = validate_providers(&[p]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBuffer { value: 101, .. }));
    }

    #[test]
    fn test_provider_deserialize_defaults() {
        let toml_str = r#"
id = "groq"
rpm_limit = 30
tpm_limit = 6000
model = "llama"
endpoint = "https://api.groq.com"
"#;
        let p: Provider = toml::from_str(toml_str).unwrap();
        assert_eq!(p.tier, 0);
        assert_eq!(p.buffer_percent, 80);
        assert!(p.task_affinities.is_empty());
        assert!(p.auth_ref.is_none());
    }
}
