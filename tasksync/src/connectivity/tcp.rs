//! TCP reachability probe.
//!
//! The device counts as online if a TCP connection to the configured address
//! completes within the timeout. The connection is dropped immediately.

use std::time::Duration;

use tokio::net::TcpStream;

use super::{Connectivity, ConnectivityProbe};

/// Probe that opens a TCP connection to a fixed address.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Create a probe for `addr` (`host:port`).
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Address being probed.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl ConnectivityProbe for TcpProbe {
    async fn fetch_state(&self) -> Connectivity {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => Connectivity::Online,
            Ok(Err(err)) => {
                tracing::debug!(addr = %self.addr, error = %err, "connectivity probe failed");
                Connectivity::Offline
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, timeout = ?self.timeout, "connectivity probe timed out");
                Connectivity::Offline
            }
        }
    }
}
