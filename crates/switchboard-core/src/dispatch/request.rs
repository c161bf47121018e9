//! Request and response values exchanged with the dispatcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use switchboard_types::provider::{Provider, TaskType};

/// One completion request as submitted by a caller.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    pub task_type: TaskType,
    /// Opaque body forwarded to the transport unchanged.
    pub payload: serde_json::Value,
    /// Token estimate reserved against the provider's TPM window.
    pub estimated_tokens: u64,
    /// Absolute deadline for the whole dispatch, retries included.
    /// `None` uses the router's default deadline.
    pub deadline: Option<Instant>,
    /// Provider to try before the normal candidate order.
    pub provider_override: Option<String>,
}

impl RoutingRequest {
    pub fn new(task_type: TaskType, payload: serde_json::Value) -> Self {
        Self {
            task_type,
            payload,
            estimated_tokens: 0,
            deadline: None,
            provider_override: None,
        }
    }

    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_provider_override(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_override = Some(provider_id.into());
        self
    }
}

/// What a transport returns for a served request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub body: serde_json::Value,
    /// Actual tokens consumed, committed in place of the estimate.
    pub tokens_used: u64,
}

/// Successful outcome of [`crate::Dispatcher::dispatch`].
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub request_id: Uuid,
    pub provider: Provider,
    pub response: ProviderResponse,
    /// End to end, from dispatch start to the served response.
    pub latency: Duration,
    /// Transient retries across every provider tried for this request.
    pub retries: u32,
}
