//! Time-windowed quota accounting per provider.
//!
//! - `window`: the per-provider window counters and status state machine
//! - `tracker`: the concurrent owner of all windows, plus RAII reservations

pub mod tracker;
pub mod window;

pub use tracker::{QuotaSnapshot, QuotaTracker, Reservation};
pub use window::{QuotaWindow, Rejection, WINDOW};
