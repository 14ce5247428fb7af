//! Configuration module for Lightrack
//!
//! Values come from an optional JSON file and from the command line. They
//! are validated once into an immutable [`TrackerConfig`] before any socket
//! is created.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::common::address::{self, AddressFamily, DEFAULT_PORT};
use crate::error::{Error, Result};

/// Upper bound for count and timeout values (the range of a C `int`)
pub const MAX_BOUNDED: u64 = i32::MAX as u64;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Local endpoint to bind before connecting
    #[serde(default)]
    pub bind: Option<EndpointConfig>,

    /// Remote endpoint to track
    #[serde(default)]
    pub to: Option<EndpointConfig>,

    /// Keep-alive cadence and retry delay, e.g. 5, "5s", "1500ms", "2.5"
    #[serde(default = "default_timeout")]
    pub timeout: TimeoutValue,

    /// Keep-alive retransmission count
    #[serde(default = "default_count")]
    pub count: u64,
}

fn default_timeout() -> TimeoutValue {
    TimeoutValue::Text("5s".to_string())
}

fn default_count() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            bind: None,
            to: None,
            timeout: default_timeout(),
            count: default_count(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Example configuration printed by `--gen-config`
    pub fn example() -> Self {
        Config {
            to: Some(EndpointConfig {
                address: IpAddr::from([192, 0, 2, 10]),
                port: DEFAULT_PORT,
            }),
            ..Default::default()
        }
    }

    /// Set the local endpoint from command-line strings
    pub fn set_bind(&mut self, ip: &str, port: Option<&str>) -> Result<()> {
        self.bind = Some(EndpointConfig::parse(ip, port)?);
        Ok(())
    }

    /// Set the remote endpoint from command-line strings
    pub fn set_to(&mut self, ip: &str, port: Option<&str>) -> Result<()> {
        self.to = Some(EndpointConfig::parse(ip, port)?);
        Ok(())
    }

    /// Set the interval from a command-line string
    pub fn set_timeout(&mut self, s: &str) -> Result<()> {
        // Parse eagerly so a typo is reported against the argument
        parse_interval(s)?;
        self.timeout = TimeoutValue::Text(s.to_string());
        Ok(())
    }

    /// Set the keep-alive count from a command-line string
    pub fn set_count(&mut self, s: &str) -> Result<()> {
        self.count = s
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid count: {}", s)))?;
        Ok(())
    }

    /// Validate into the immutable value the tracker runs on
    pub fn validate(&self) -> Result<TrackerConfig> {
        let remote = self
            .to
            .as_ref()
            .map(EndpointConfig::socket_addr)
            .ok_or_else(|| Error::Config("option `to' is mandatory".into()))?;

        if self.count > MAX_BOUNDED {
            return Err(Error::Config("option `count' is too big".into()));
        }

        let interval = self.timeout.interval()?;
        // Whole seconds only; sub-second remainders are dropped
        let secs = interval.as_secs();
        if secs > MAX_BOUNDED {
            return Err(Error::Config("option `timeout' is too big".into()));
        }

        let bind = self.bind.as_ref().map(EndpointConfig::socket_addr);
        if let Some(local) = &bind {
            if !address::same_family(local, &remote) {
                return Err(Error::Config(format!(
                    "`to' and `bind' are not compatible ({} vs {})",
                    AddressFamily::of_socket(&remote),
                    AddressFamily::of_socket(local)
                )));
            }
        }

        Ok(TrackerConfig {
            bind,
            remote,
            policy: RetryPolicy {
                keepalive_count: self.count as u32,
                interval: Duration::from_secs(secs),
            },
        })
    }
}

/// Timeout as written in the file: bare seconds or a string with a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeoutValue {
    Seconds(f64),
    Text(String),
}

impl TimeoutValue {
    pub fn interval(&self) -> Result<Duration> {
        match self {
            TimeoutValue::Seconds(secs) => scaled_interval(*secs, 1_000.0, &secs.to_string()),
            TimeoutValue::Text(s) => parse_interval(s),
        }
    }
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One endpoint as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// IP address (no port)
    pub address: IpAddr,

    /// Port, set independently of the address
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl EndpointConfig {
    fn parse(ip: &str, port: Option<&str>) -> Result<Self> {
        let address = address::parse_ip(ip)?;
        let port = match port {
            Some(p) => address::parse_port(p)?,
            None => DEFAULT_PORT,
        };
        Ok(Self { address, port })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        address::with_port(self.address, self.port)
    }
}

/// Keep-alive and retry cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Keep-alive retransmission count; zero leaves the kernel default
    pub keepalive_count: u32,

    /// Keep-alive idle time and spacing and the delay between attempts
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            keepalive_count: default_count() as u32,
            interval: Duration::from_secs(5),
        }
    }
}

/// Validated, immutable tracker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Local endpoint; `None` lets the kernel pick one at connect time
    pub bind: Option<SocketAddr>,
    pub remote: SocketAddr,
    pub policy: RetryPolicy,
}

impl TrackerConfig {
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            bind: None,
            remote,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = Some(bind);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Family every socket of this tracker is allocated in
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of_socket(&self.remote)
    }
}

/// Parse an interval with optional unit suffix.
///
/// Accepts `ms`, `s`, `m` and `h` suffixes and fractional values; a bare
/// number is seconds.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || Error::Config(format!("Invalid timeout: {}", s));

    let (number, millis_per_unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000.0)
    } else {
        (s, 1_000.0)
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    scaled_interval(value, millis_per_unit, s)
}

fn scaled_interval(value: f64, millis_per_unit: f64, shown: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!("Invalid timeout: {}", shown)));
    }

    let millis = value * millis_per_unit;
    if millis >= u64::MAX as f64 {
        return Err(Error::Config("option `timeout' is too big".into()));
    }

    Ok(Duration::from_millis(millis as u64))
}
