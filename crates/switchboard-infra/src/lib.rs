//! Infrastructure layer for Switchboard.
//!
//! Contains implementations of the port traits defined in `switchboard-core`:
//! the SQLite-backed usage log, plus config file loading and data directory
//! resolution.

pub mod config;
pub mod sqlite;
