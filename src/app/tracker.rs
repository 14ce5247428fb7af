//! Tracker - connection lifecycle
//!
//! Each cycle walks the same states on a fresh socket:
//!
//! ```text
//! CreateSocket → Configure → [Bind] → Connect ⟲ → WaitForClose → Teardown → Delay
//!                               │         (retry after interval)                ↑
//!                               └──────── bind failed ──────────────────────────┘
//! ```
//!
//! Only a failure to allocate the socket leaves the loop. Everything else is
//! logged and absorbed.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::common::Result;
use crate::config::TrackerConfig;
use crate::transport::{Link, TcpTransport, Transport};

use super::stats::TrackerStats;

/// Scratch buffer for the wait-for-close reads; contents are discarded
const DRAIN_BUFFER_SIZE: usize = 64;

/// How a cycle ended (before the delay)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Bind to the local endpoint failed; no connect was attempted
    BindFailed,
    /// Peer closed the connection
    PeerClosed,
    /// Reading from the connection failed
    ReadFailed,
}

/// Drives the reconnect loop against one remote endpoint
pub struct Tracker {
    config: TrackerConfig,
    transport: Arc<dyn Transport>,
    stats: Arc<TrackerStats>,
}

impl Tracker {
    /// Tracker on real TCP sockets
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_transport(config, Arc::new(TcpTransport::new()))
    }

    pub fn with_transport(config: TrackerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            stats: Arc::new(TrackerStats::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<TrackerStats> {
        self.stats.clone()
    }

    /// Run forever. Returns only when a socket cannot be allocated.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Tracking {} (bind: {}, interval: {}s, keep-alive count: {})",
            self.config.remote,
            self.config
                .bind
                .map(|b| b.to_string())
                .unwrap_or_else(|| "any".to_string()),
            self.config.policy.interval.as_secs(),
            self.config.policy.keepalive_count
        );

        loop {
            let outcome = self.run_cycle().await?;
            debug!(
                "Cycle ended ({:?}), next attempt in {}s",
                outcome,
                self.config.policy.interval.as_secs()
            );
            sleep(self.config.policy.interval).await;
        }
    }

    /// One cycle: create, configure, bind, connect, wait, teardown.
    ///
    /// The delay that follows a cycle is left to the caller.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.stats.cycle_started();

        let mut link = self.transport.open(self.config.family())?;

        let report = link.configure(&self.config.policy);
        if report.is_clean() {
            debug!("Socket tuned for {}", self.config.remote);
        } else {
            for (option, err) in report.failures() {
                warn!("Couldn't set {}: {}", option, err);
            }
            self.stats.tuning_failed(report.failure_count());
        }

        if let Some(local) = self.config.bind {
            if let Err(e) = link.bind(local) {
                warn!("Bind to {} failed: {}", local, e);
                self.stats.bind_failed();
                return Ok(CycleOutcome::BindFailed);
            }
            debug!("Bound to {}", local);
        }

        self.connect(link.as_mut()).await;

        let outcome = self.wait_for_close(link.as_mut()).await;

        drop(link);
        debug!("Socket to {} closed", self.config.remote);

        Ok(outcome)
    }

    /// Connect on the same socket until it succeeds
    async fn connect(&self, link: &mut dyn Link) {
        let remote = self.config.remote;

        loop {
            self.stats.connect_attempted();
            match link.connect(remote).await {
                Ok(()) => {
                    self.stats.connected();
                    info!("Connected to {}", remote);
                    return;
                }
                Err(e) => {
                    self.stats.connect_failed();
                    warn!("Connect to {} failed: {}", remote, e);
                    sleep(self.config.policy.interval).await;
                }
            }
        }
    }

    /// Block until the peer closes or the connection errors out.
    ///
    /// Anything received is dropped unread.
    async fn wait_for_close(&self, link: &mut dyn Link) -> CycleOutcome {
        let mut buf = [0u8; DRAIN_BUFFER_SIZE];

        loop {
            match link.read(&mut buf).await {
                Ok(0) => {
                    self.stats.peer_closed();
                    info!("Disconnected from {}", self.config.remote);
                    return CycleOutcome::PeerClosed;
                }
                Ok(n) => {
                    debug!("Discarding {} bytes from {}", n, self.config.remote);
                }
                Err(e) => {
                    self.stats.read_failed();
                    warn!("Connection to {} lost: {}", self.config.remote, e);
                    return CycleOutcome::ReadFailed;
                }
            }
        }
    }
}
