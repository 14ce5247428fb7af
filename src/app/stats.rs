//! Tracker statistics
//!
//! Plain process-local counters. They are logged on request (SIGUSR1) and
//! when the process exits; nothing is exported.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Lifecycle counters shared between the tracker and the driver
#[derive(Debug, Default)]
pub struct TrackerStats {
    cycles: AtomicU64,
    bind_failures: AtomicU64,
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    connections: AtomicU64,
    peer_closes: AtomicU64,
    read_failures: AtomicU64,
    tuning_failures: AtomicU64,
}

/// Point-in-time copy of [`TrackerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub bind_failures: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub connections: u64,
    pub peer_closes: u64,
    pub read_failures: u64,
    pub tuning_failures: u64,
}

impl TrackerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle_started(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tuning_failed(&self, count: usize) {
        self.tuning_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bind_failed(&self) {
        self.bind_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_attempted(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_failed(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn peer_closed(&self) {
        self.peer_closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read_failed(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            bind_failures: self.bind_failures.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            peer_closes: self.peer_closes.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            tuning_failures: self.tuning_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log(&self) {
        let s = self.snapshot();
        info!(
            "Stats: cycles={} connections={} connect_attempts={} connect_failures={} \
             bind_failures={} peer_closes={} read_failures={} tuning_failures={}",
            s.cycles,
            s.connections,
            s.connect_attempts,
            s.connect_failures,
            s.bind_failures,
            s.peer_closes,
            s.read_failures,
            s.tuning_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = TrackerStats::new();
        stats.cycle_started();
        stats.connect_attempted();
        stats.connect_failed();
        stats.connect_attempted();
        stats.connected();
        stats.tuning_failed(2);

        let s = stats.snapshot();
        assert_eq!(s.cycles, 1);
        assert_eq!(s.connect_attempts, 2);
        assert_eq!(s.connect_failures, 1);
        assert_eq!(s.connections, 1);
        assert_eq!(s.tuning_failures, 2);
        assert_eq!(s.peer_closes, 0);
    }
}
