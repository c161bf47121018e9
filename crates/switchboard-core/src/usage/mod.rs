//! Usage persistence port and the in-memory implementation.

pub mod memory;
pub mod store;

pub use memory::InMemoryUsageStore;
pub use store::UsageStore;
