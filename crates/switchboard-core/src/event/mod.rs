//! Event bus for routing notifications.
//!
//! Provides an `EventBus` that distributes `RouterEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::{EventBus, Subscription};
