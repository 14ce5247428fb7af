//! Loopback scenarios against real kernel sockets

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Instant};

use lightrack::{RetryPolicy, Tracker, TrackerConfig};

const INTERVAL: Duration = Duration::from_secs(1);

fn tracker(config: TrackerConfig) -> Tracker {
    Tracker::new(config.with_policy(RetryPolicy {
        keepalive_count: 3,
        interval: INTERVAL,
    }))
}

/// A loopback port with nothing listening on it
fn closed_port() -> SocketAddr {
    let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    holder.local_addr().unwrap()
}

#[tokio::test]
async fn test_reconnects_within_interval_after_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tracker = tracker(TrackerConfig::new(listener.local_addr().unwrap()));
    let stats = tracker.stats();
    let handle = tokio::spawn(async move { tracker.run().await });

    let (first, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("first connect")
        .unwrap();

    sleep(Duration::from_secs(2)).await;
    drop(first);
    let closed_at = Instant::now();

    let (_second, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("reconnect after close")
        .unwrap();
    let gap = closed_at.elapsed();
    assert!(gap >= Duration::from_millis(900), "reconnected too early: {:?}", gap);
    assert!(gap < INTERVAL + Duration::from_secs(1), "reconnected too late: {:?}", gap);

    assert_eq!(stats.snapshot().peer_closes, 1);
    assert!(!handle.is_finished());
    handle.abort();
}

#[tokio::test]
async fn test_refused_remote_retries_at_steady_cadence() {
    let tracker = tracker(TrackerConfig::new(closed_port()));
    let stats = tracker.stats();
    let handle = tokio::spawn(async move { tracker.run().await });

    sleep(INTERVAL * 3 + Duration::from_millis(500)).await;

    let snapshot = stats.snapshot();
    assert!(
        (3..=5).contains(&snapshot.connect_attempts),
        "unexpected attempt count: {}",
        snapshot.connect_attempts
    );
    assert_eq!(snapshot.connect_failures, snapshot.connect_attempts);
    assert_eq!(snapshot.connections, 0);
    // Retries stay on the first socket
    assert_eq!(snapshot.cycles, 1);
    assert!(!handle.is_finished());
    handle.abort();
}

#[tokio::test]
async fn test_bind_failure_never_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote = listener.local_addr().unwrap();
    // Held for the whole test so every bind gets EADDRINUSE
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = TrackerConfig::new(remote).with_bind(taken.local_addr().unwrap());
    let tracker = tracker(config);
    let stats = tracker.stats();
    let handle = tokio::spawn(async move { tracker.run().await });

    let accepted = timeout(INTERVAL * 2 + Duration::from_millis(500), listener.accept()).await;
    assert!(accepted.is_err(), "no connect may follow a failed bind");

    let snapshot = stats.snapshot();
    assert!(snapshot.bind_failures >= 2);
    assert_eq!(snapshot.cycles, snapshot.bind_failures);
    assert_eq!(snapshot.connect_attempts, 0);
    assert!(!handle.is_finished());
    handle.abort();
    drop(taken);
}

#[tokio::test]
async fn test_connects_from_bound_address() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote = listener.local_addr().unwrap();
    let config = TrackerConfig::new(remote).with_bind("127.0.0.1:0".parse().unwrap());
    let tracker = tracker(config);
    let handle = tokio::spawn(async move { tracker.run().await });

    let (_peer, from) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("connect from bound address")
        .unwrap();
    assert_eq!(from.ip(), remote.ip());
    handle.abort();
}
