//! Endpoint helpers: address families and port setup

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use socket2::Domain;

use crate::error::{Error, Result};

/// Default port used for both endpoints when none is given
pub const DEFAULT_PORT: u16 = 8080;

/// Address family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Family of an IP address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Family of a socket address
    pub fn of_socket(addr: &SocketAddr) -> Self {
        Self::of(&addr.ip())
    }

    /// socket2 domain used to allocate a stream socket of this family
    pub fn domain(self) -> Domain {
        match self {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Attach a port to an IP address.
///
/// The port is configured independently of the address, so endpoints are
/// assembled here rather than parsed as `ip:port` strings.
pub fn with_port(ip: IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(ip, port)
}

/// Parse a bare IP address (no port, no brackets)
pub fn parse_ip(s: &str) -> Result<IpAddr> {
    s.trim()
        .parse()
        .map_err(|_| Error::InvalidAddress(s.to_string()))
}

/// Parse a port number
pub fn parse_port(s: &str) -> Result<u16> {
    s.trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid port: {}", s)))
}

/// Check that two endpoints can be used on the same socket
pub fn same_family(a: &SocketAddr, b: &SocketAddr) -> bool {
    AddressFamily::of_socket(a) == AddressFamily::of_socket(b)
}
