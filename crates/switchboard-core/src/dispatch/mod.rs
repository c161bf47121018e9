//! Request dispatch: the transport port, backoff, and the dispatcher itself.

pub mod backoff;
pub mod dispatcher;
pub mod request;
pub mod transport;

pub use backoff::Backoff;
pub use dispatcher::Dispatcher;
pub use request::{DispatchResult, ProviderResponse, RoutingRequest};
pub use transport::ProviderTransport;
