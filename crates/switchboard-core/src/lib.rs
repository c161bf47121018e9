//! Routing logic and port trait definitions for Switchboard.
//!
//! This crate owns the concurrency-critical pieces: per-provider quota
//! windows, candidate selection, and the failover dispatcher. It defines the
//! "ports" ([`dispatch::ProviderTransport`], [`usage::UsageStore`]) that
//! callers and the infrastructure layer implement, and never depends on any
//! network or database crate.

pub mod dispatch;
pub mod event;
pub mod quota;
pub mod routing;
pub mod usage;

pub use dispatch::{DispatchResult, Dispatcher, ProviderResponse, ProviderTransport, RoutingRequest};
pub use event::{EventBus, Subscription};
pub use quota::{QuotaSnapshot, QuotaTracker, Reservation};
pub use routing::{ProviderRegistry, SelectionPolicy};
pub use usage::{InMemoryUsageStore, UsageStore};
