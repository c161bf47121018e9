//! Observability setup for Switchboard.
//!
//! Installs the global `tracing` subscriber, optionally bridged to
//! OpenTelemetry. Library crates only emit events; binaries call
//! [`tracing_setup::init_tracing`] once at startup.

pub mod tracing_setup;
