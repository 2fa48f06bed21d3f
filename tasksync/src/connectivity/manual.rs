//! Settable connectivity probe.
//!
//! Reports whatever state was last set. Used by tests and by the CLI's
//! `--offline` mode.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{Connectivity, ConnectivityProbe};

/// Probe backed by an in-memory flag.
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    /// Create a probe that initially reports `online`.
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Change the reported state. Takes effect on the next probe.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ManualProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for ManualProbe {
    async fn fetch_state(&self) -> Connectivity {
        Connectivity::from_connected(self.online.load(Ordering::SeqCst))
    }
}
