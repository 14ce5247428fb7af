//! TCP Transport implementation
//!
//! Sockets are created with socket2 so they can be tuned and bound before
//! connecting, then registered with tokio's reactor through `AsyncFd`.
//! Connect is issued non-blocking and completed on writability, which lets
//! a failed connect be reissued on the same socket.

use std::io::{self, Read};
use std::net::SocketAddr;

use async_trait::async_trait;
use socket2::{Protocol, Socket, Type};
use tokio::io::unix::AsyncFd;
use tracing::trace;

use crate::common::{AddressFamily, Result};
use crate::config::RetryPolicy;
use crate::error::Error;

use super::tuning::{self, TuningReport};
use super::{Link, Transport};

/// TCP transport - raw kernel stream sockets
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn open(&self, family: AddressFamily) -> Result<Box<dyn Link>> {
        let socket = Socket::new(family.domain(), Type::STREAM, Some(Protocol::TCP))
            .map_err(Error::Socket)?;
        socket.set_nonblocking(true).map_err(Error::Socket)?;
        let fd = AsyncFd::new(socket).map_err(Error::Socket)?;

        trace!("Allocated {} stream socket", family);
        Ok(Box::new(TcpLink { fd, aborted: false }))
    }
}

/// A single kernel socket driven by the tokio reactor
pub struct TcpLink {
    fd: AsyncFd<Socket>,
    /// Last handshake failed after `EINPROGRESS`
    aborted: bool,
}

impl TcpLink {
    pub fn socket(&self) -> &Socket {
        self.fd.get_ref()
    }
}

#[async_trait]
impl Link for TcpLink {
    fn configure(&mut self, policy: &RetryPolicy) -> TuningReport {
        tuning::configure(self.socket(), policy)
    }

    fn bind(&mut self, addr: SocketAddr) -> io::Result<()> {
        self.socket().bind(&addr.into())
    }

    async fn connect(&mut self, addr: SocketAddr) -> io::Result<()> {
        let target = addr.into();
        let mut result = self.socket().connect(&target);

        // A non-blocking handshake that failed leaves the socket in the
        // connecting state; the next connect() only resets it.
        if std::mem::take(&mut self.aborted) && is_errno(&result, libc::ECONNABORTED) {
            result = self.socket().connect(&target);
        }

        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(e) => return Err(e),
        }

        loop {
            let mut guard = self.fd.writable().await?;
            let socket = guard.get_inner();

            // The handshake result lands in SO_ERROR
            if let Some(e) = socket.take_error()? {
                self.aborted = true;
                return Err(e);
            }

            match socket.peer_addr() {
                Ok(_) => return Ok(()),
                // Stale readiness from before the connect was issued
                Err(e) if e.kind() == io::ErrorKind::NotConnected => guard.clear_ready(),
                Err(e) => {
                    self.aborted = true;
                    return Err(e);
                }
            }
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|fd| fd.get_ref().read(buf)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

fn is_errno(result: &io::Result<()>, errno: i32) -> bool {
    matches!(result, Err(e) if e.raw_os_error() == Some(errno))
}
