use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::provider::ProviderStatus;

/// Errors raised while loading or validating router configuration.
///
/// These fail fast at load/reload time and never reach dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("provider id must not be empty")]
    EmptyProviderId,

    #[error("duplicate provider id '{0}'")]
    DuplicateProvider(String),

    #[error("provider '{provider}': {field} must be positive")]
    NonPositiveLimit {
        provider: String,
        field: &'static str,
    },

    #[error("provider '{provider}': buffer_percent {value} is outside 0-100")]
    InvalidBuffer { provider: String, value: u8 },

    #[error("invalid router setting: {0}")]
    InvalidSetting(String),

    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// How the dispatcher reacts to a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Remote rate limit: throttle the provider and fail over without retry.
    QuotaExceeded,
    /// Network failure or server error: bounded retry, then fail over.
    Transient,
    /// Auth failure or malformed request: cool the provider down, no retry.
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::QuotaExceeded => write!(f, "quota_exceeded"),
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}

impl std::str::FromStr for ErrorClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quota_exceeded" => Ok(ErrorClass::QuotaExceeded),
            "transient" => Ok(ErrorClass::Transient),
            "fatal" => Ok(ErrorClass::Fatal),
            other => Err(format!("invalid error class: '{other}'")),
        }
    }
}

/// Errors returned by a provider transport.
///
/// Never surfaced to dispatch callers directly; the dispatcher classifies
/// them with [`ProviderError::class`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Build an error from an HTTP-style status code.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited { retry_after_ms },
            408 => ProviderError::Timeout,
            401 | 403 => ProviderError::AuthenticationFailed,
            503 | 529 => ProviderError::Overloaded(message),
            500..=599 => ProviderError::Server { status, message },
            _ => ProviderError::InvalidRequest(format!("{status}: {message}")),
        }
    }

    /// Classify this error for retry/failover decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::RateLimited { .. } => ErrorClass::QuotaExceeded,
            ProviderError::Network(_)
            | ProviderError::Timeout
            | ProviderError::Overloaded(_)
            | ProviderError::Server { .. } => ErrorClass::Transient,
            ProviderError::AuthenticationFailed | ProviderError::InvalidRequest(_) => {
                ErrorClass::Fatal
            }
        }
    }
}

/// Why a provider did not serve a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Skipped because of its routing status.
    Unavailable { status: ProviderStatus },
    /// Skipped because the local quota window had no room.
    QuotaFull,
    /// The provider reported a rate limit.
    QuotaExceeded { message: String },
    /// Transient errors persisted through every retry.
    Transient { attempts: u32, message: String },
    /// A fatal error put the provider into cool-down.
    Fatal { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unavailable { status } => write!(f, "{status}"),
            FailureReason::QuotaFull => write!(f, "local quota full"),
            FailureReason::QuotaExceeded { message } => write!(f, "quota exceeded: {message}"),
            FailureReason::Transient { attempts, message } => {
                write!(f, "transient after {attempts} attempts: {message}")
            }
            FailureReason::Fatal { message } => write!(f, "fatal: {message}"),
        }
    }
}

/// A provider paired with the reason it did not serve a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub reason: FailureReason,
}

fn summarize(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no candidate providers configured".to_string();
    }
    list_failures(failures)
}

fn list_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "none".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{} ({})", f.provider_id, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Terminal errors surfaced to dispatch callers.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    #[error("all providers exhausted: {}", summarize(.failures))]
    AllProvidersExhausted { failures: Vec<ProviderFailure> },

    #[error(
        "deadline exceeded after {elapsed_ms}ms (attempted: {}; failed: {})",
        .attempted.join(", "),
        list_failures(.failures)
    )]
    DeadlineExceeded {
        elapsed_ms: u64,
        /// Every provider called, in order, including the one cut off.
        attempted: Vec<String>,
        /// Providers that failed before the deadline fired.
        failures: Vec<ProviderFailure>,
    },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Errors from usage-log storage operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),
}
