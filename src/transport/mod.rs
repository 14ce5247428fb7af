//! Transport Layer
//!
//! Responsibilities:
//! - Allocate one raw stream socket per attempt
//! - Tune, bind, connect and read it
//! - NO application protocol, NO data ever written
//!
//! The tracker only sees these traits, so the lifecycle can be driven
//! against a real kernel socket or a scripted one.

mod tcp;
pub mod tuning;

pub use tcp::{TcpLink, TcpTransport};
pub use tuning::{SetOption, SocketOption, TuningReport};

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;

use crate::common::{AddressFamily, Result};
use crate::config::RetryPolicy;

/// Transport trait for allocating fresh connection attempts
pub trait Transport: Send + Sync {
    /// Allocate a new stream socket in `family`.
    ///
    /// An error here means the process cannot get a socket at all and is
    /// reported as [`crate::Error::Socket`].
    fn open(&self, family: AddressFamily) -> Result<Box<dyn Link>>;
}

/// One socket, owned by a single loop iteration.
///
/// Dropping the link closes the socket.
#[async_trait]
pub trait Link: Send {
    /// Apply keep-alive and fast-open tuning, best effort
    fn configure(&mut self, policy: &RetryPolicy) -> TuningReport;

    /// Bind to a local endpoint
    fn bind(&mut self, addr: SocketAddr) -> io::Result<()>;

    /// Connect to the remote endpoint. May be called again on the same
    /// link after a failure.
    async fn connect(&mut self, addr: SocketAddr) -> io::Result<()>;

    /// Read whatever the peer sends; `Ok(0)` means the peer closed
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
