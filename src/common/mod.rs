//! Common types and helpers
//!
//! - Address: endpoint families and address/port setup
//! - Error: unified error types

pub mod address;

pub use address::{AddressFamily, DEFAULT_PORT};

// Re-export error types from crate root
pub use crate::error::{Error, Result};
