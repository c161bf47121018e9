//! Lifecycle events broadcast by the dispatcher.
//!
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::{ProviderStatus, TaskType};

/// Events emitted while routing requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterEvent {
    /// A request moved from one provider to the next candidate.
    ProviderSwitch {
        request_id: Uuid,
        from: String,
        to: String,
        reason: String,
    },

    /// A provider stopped accepting work (throttled or cooling down).
    LimitReached {
        provider_id: String,
        status: ProviderStatus,
        /// True when a provider response triggered the change, false when
        /// local quota counters did.
        remote: bool,
    },

    /// A request was served.
    RequestCompleted {
        request_id: Uuid,
        provider_id: String,
        task_type: TaskType,
        tokens_used: u64,
        latency_ms: u64,
        retries: u32,
    },
}

impl RouterEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RouterEvent::ProviderSwitch { .. } => EventKind::ProviderSwitch,
            RouterEvent::LimitReached { .. } => EventKind::LimitReached,
            RouterEvent::RequestCompleted { .. } => EventKind::RequestCompleted,
        }
    }
}

/// Discriminant of [`RouterEvent`], used for filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProviderSwitch,
    LimitReached,
    RequestCompleted,
}
