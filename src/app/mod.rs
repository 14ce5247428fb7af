//! Application Layer
//!
//! This module contains:
//! - Tracker: the connect/keepalive/disconnect lifecycle loop
//! - Stats: process-local lifecycle counters

mod stats;
mod tracker;

pub use stats::{StatsSnapshot, TrackerStats};
pub use tracker::{CycleOutcome, Tracker};
