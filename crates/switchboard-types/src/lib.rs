//! Shared domain types for Switchboard.
//!
//! This crate contains the core domain types used across the router:
//! providers and their status, usage records and aggregates, lifecycle
//! events, router settings, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod provider;
pub mod usage;
