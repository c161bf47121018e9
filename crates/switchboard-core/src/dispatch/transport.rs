//! Provider transport trait definition.
//!
//! The dispatcher is the only caller. Implementations own the wire protocol
//! (HTTP client, auth header from `auth_ref`, response parsing) and map every
//! failure onto a [`ProviderError`] so the dispatcher can classify it.

use switchboard_types::error::ProviderError;
use switchboard_types::provider::Provider;

use super::request::{ProviderResponse, RoutingRequest};

/// Sends one request to one provider.
///
/// The returned future is dropped when the request deadline passes, so it
/// must be cancel-safe: no state may be left half-written on drop.
pub trait ProviderTransport: Send + Sync {
    fn send(
        &self,
        provider: &Provider,
        request: &RoutingRequest,
    ) -> impl std::future::Future<Output = Result<ProviderResponse, ProviderError>> + Send;
}
