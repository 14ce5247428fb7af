//! Lightrack - a persistent TCP reachability tracker
//!
//! Lightrack keeps one outbound TCP connection to a remote endpoint open,
//! tunes keep-alive on it, and waits for it to die. When it does, it waits
//! for the configured interval and connects again. No data is ever sent.
//!
//! # Architecture
//!
//! ```text
//! Config (JSON + command line)
//! → TrackerConfig (validated, immutable)
//! → Tracker (lifecycle loop)
//! → Transport / Link (socket allocation, tuning, bind, connect, read)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Address families, endpoint helpers
//! ├── transport/       # Socket seam: TCP sockets and option tuning
//! ├── app/             # Tracker loop and its statistics
//! ├── config.rs        # Configuration and validation
//! └── error.rs         # Error type
//! ```

// Core types
pub mod common;
pub mod error;

// Layered architecture
pub mod transport;
pub mod app;

// Supporting modules
pub mod config;

// Re-exports for convenience
pub use common::AddressFamily;
pub use error::{Error, Result};
pub use config::{Config, RetryPolicy, TrackerConfig};

// Architecture re-exports
pub use app::{CycleOutcome, StatsSnapshot, Tracker, TrackerStats};
pub use transport::{Link, TcpTransport, Transport};
