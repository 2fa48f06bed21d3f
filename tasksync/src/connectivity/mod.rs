//! Connectivity detection for `TaskSync`.
//!
//! Defines the [`ConnectivityProbe`] trait and the [`ConnectivityMonitor`]
//! that turns point-in-time probes into transition events. Probe
//! implementations:
//! - [`manual::ManualProbe`]: settable flag for tests and forced offline mode
//! - [`tcp::TcpProbe`]: TCP connect to a well-known address within a timeout
//!
//! Connectivity is a black-box boolean: there is no notion of link quality.

pub mod manual;
pub mod tcp;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Capacity of the transition broadcast channel.
const EVENT_BUFFER: usize = 32;

/// Point-in-time network state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// The backend is assumed reachable.
    Online,
    /// No network.
    Offline,
}

impl Connectivity {
    /// Returns `true` for [`Connectivity::Online`].
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }

    /// Maps a `connected` flag to a state.
    #[must_use]
    pub const fn from_connected(connected: bool) -> Self {
        if connected { Self::Online } else { Self::Offline }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Async probe reporting whether the device is currently connected.
pub trait ConnectivityProbe: Send + Sync {
    /// Probe the network once.
    fn fetch_state(&self) -> impl std::future::Future<Output = Connectivity> + Send;
}

/// Tracks connectivity and broadcasts every transition.
///
/// [`check_now`](Self::check_now) probes, records the result and, if it
/// differs from the last recorded state, broadcasts it. Subscribers get one
/// initial state on subscribe and then every transition.
pub struct ConnectivityMonitor<P: ConnectivityProbe> {
    probe: P,
    last: Mutex<Option<Connectivity>>,
    events: broadcast::Sender<Connectivity>,
}

impl<P: ConnectivityProbe> ConnectivityMonitor<P> {
    /// Create a monitor around `probe`. No probe runs until first use.
    #[must_use]
    pub fn new(probe: P) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            probe,
            last: Mutex::new(None),
            events,
        }
    }

    /// Access the underlying probe.
    #[must_use]
    pub const fn probe(&self) -> &P {
        &self.probe
    }

    /// Probe now, record the state, and broadcast it if it changed.
    pub async fn check_now(&self) -> Connectivity {
        let state = self.probe.fetch_state().await;
        let previous = self.last.lock().replace(state);
        if previous != Some(state) {
            tracing::info!(
                from = previous.map_or_else(|| "unknown".to_string(), |p| p.to_string()),
                to = %state,
                "connectivity changed"
            );
            // No receivers is fine: nobody is listening yet.
            let _ = self.events.send(state);
        }
        state
    }

    /// Last recorded state, without probing.
    #[must_use]
    pub fn current(&self) -> Option<Connectivity> {
        *self.last.lock()
    }

    /// Raw receiver of state transitions.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<Connectivity> {
        self.events.subscribe()
    }

    /// Deliver the current state once, then every transition, to `handler`.
    ///
    /// The handler runs on a spawned task; delivery stops when the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(self: &Arc<Self>, mut handler: F) -> Subscription
    where
        F: FnMut(Connectivity) + Send + 'static,
        P: 'static,
    {
        // Subscribe before probing so no transition between the two is lost.
        let mut rx = self.events();
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            // Goes through check_now so a first recorded state also reaches
            // raw event listeners.
            let initial = monitor.check_now().await;
            handler(initial);
            let mut delivered = initial;
            loop {
                match rx.recv().await {
                    Ok(state) => {
                        if state != delivered {
                            delivered = state;
                            handler(state);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "connectivity subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { handle }
    }

    /// Spawn a background task that probes every `interval`, turning
    /// changes into broadcast transitions.
    ///
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()>
    where
        P: 'static,
    {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                monitor.check_now().await;
            }
        })
    }
}

/// Handle for a [`ConnectivityMonitor::subscribe`] registration.
#[must_use = "dropping a Subscription stops delivery"]
pub struct Subscription {
    handle: tokio::task::JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering events to the handler.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    /// Returns `true` while the handler task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
