//! SQLite storage layer.
//!
//! The usage log backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod pool;
pub mod usage;
