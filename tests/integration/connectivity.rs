//! Integration tests for the connectivity monitor.
//!
//! Subscribers receive the current state once and then only transitions;
//! unsubscribing stops delivery; the poller turns probe changes into
//! broadcast events.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tasksync::connectivity::manual::ManualProbe;
use tasksync::connectivity::tcp::TcpProbe;
use tasksync::connectivity::{Connectivity, ConnectivityMonitor};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

const WAIT: Duration = Duration::from_secs(5);

fn monitor(online: bool) -> Arc<ConnectivityMonitor<ManualProbe>> {
    Arc::new(ConnectivityMonitor::new(ManualProbe::new(online)))
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Connectivity>) -> Connectivity {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for connectivity event")
        .expect("subscription channel closed")
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Connectivity>) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {got:?}");
}

// ===========================================================================
// Subscribe
// ===========================================================================

#[tokio::test]
async fn subscriber_sees_initial_state_then_transitions() {
    let m = monitor(true);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = m.subscribe(move |state| {
        let _ = tx.send(state);
    });

    assert_eq!(next(&mut rx).await, Connectivity::Online);

    m.probe().set_online(false);
    m.check_now().await;
    assert_eq!(next(&mut rx).await, Connectivity::Offline);

    m.probe().set_online(true);
    m.check_now().await;
    assert_eq!(next(&mut rx).await, Connectivity::Online);
}

#[tokio::test]
async fn repeated_checks_without_change_are_silent() {
    let m = monitor(false);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = m.subscribe(move |state| {
        let _ = tx.send(state);
    });
    assert_eq!(next(&mut rx).await, Connectivity::Offline);

    for _ in 0..3 {
        m.check_now().await;
    }
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let m = monitor(true);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = m.subscribe(move |state| {
        let _ = tx.send(state);
    });
    assert_eq!(next(&mut rx).await, Connectivity::Online);
    assert!(sub.is_active());

    sub.unsubscribe();
    m.probe().set_online(false);
    m.check_now().await;

    // The handler (and its sender) is gone once the task is aborted.
    let got = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(got, None);
}

#[tokio::test]
async fn dropping_the_subscription_also_stops_delivery() {
    let m = monitor(true);
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let _sub = m.subscribe(move |state| {
            let _ = tx.send(state);
        });
        assert_eq!(next(&mut rx).await, Connectivity::Online);
    }
    m.probe().set_online(false);
    m.check_now().await;
    let got = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(got, None);
}

#[tokio::test]
async fn raw_listener_sees_state_first_recorded_by_subscriber() {
    let m = monitor(true);
    let mut events = m.events();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = m.subscribe(move |state| {
        let _ = tx.send(state);
    });
    assert_eq!(next(&mut rx).await, Connectivity::Online);

    m.check_now().await;

    let raw = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(raw, Connectivity::Online);
    assert!(events.try_recv().is_err());
    // The subscriber is not handed the same state twice.
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn independent_subscribers_each_get_events() {
    let m = monitor(true);
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let _a = m.subscribe(move |s| {
        let _ = tx_a.send(s);
    });
    let _b = m.subscribe(move |s| {
        let _ = tx_b.send(s);
    });
    assert_eq!(next(&mut rx_a).await, Connectivity::Online);
    assert_eq!(next(&mut rx_b).await, Connectivity::Online);

    m.probe().set_online(false);
    m.check_now().await;
    assert_eq!(next(&mut rx_a).await, Connectivity::Offline);
    assert_eq!(next(&mut rx_b).await, Connectivity::Offline);
}

// ===========================================================================
// State and raw events
// ===========================================================================

#[tokio::test]
async fn current_is_unknown_until_first_probe() {
    let m = monitor(false);
    assert_eq!(m.current(), None);
    assert_eq!(m.check_now().await, Connectivity::Offline);
    assert_eq!(m.current(), Some(Connectivity::Offline));
}

#[tokio::test]
async fn raw_events_carry_every_transition() {
    let m = monitor(true);
    let mut events = m.events();

    m.check_now().await;
    m.probe().set_online(false);
    m.check_now().await;
    m.check_now().await;

    assert_eq!(events.recv().await.unwrap(), Connectivity::Online);
    assert_eq!(events.recv().await.unwrap(), Connectivity::Offline);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn poller_turns_probe_changes_into_events() {
    let m = monitor(true);
    let mut events = m.events();
    let poller = m.spawn_poller(Duration::from_millis(10));

    let first = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(first, Connectivity::Online);

    m.probe().set_online(false);
    let second = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(second, Connectivity::Offline);

    poller.abort();
}

// ===========================================================================
// TCP probe
// ===========================================================================

#[tokio::test]
async fn tcp_probe_follows_listener_lifetime() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let m = Arc::new(ConnectivityMonitor::new(TcpProbe::new(
        addr.clone(),
        Duration::from_millis(500),
    )));
    assert_eq!(m.probe().addr(), addr);

    assert_eq!(m.check_now().await, Connectivity::Online);
    drop(listener);
    assert_eq!(m.check_now().await, Connectivity::Offline);
}
