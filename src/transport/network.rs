//! Network link supervision
//!
//! The device does not own its network stack; it only needs to know whether
//! the broker is reachable by name and, when it is not, to ask the host to
//! bring the link back.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Host network connectivity as seen by the connection manager
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Whether the host currently has usable connectivity
    async fn is_available(&self) -> bool;

    /// Ask the host to (re)join its network; best effort
    async fn rejoin(&self);
}

/// Network link that resolves a probe address to decide availability
pub struct ProbeNetwork {
    probe: String,
    rejoin_command: Vec<String>,
    timeout: Duration,
}

impl ProbeNetwork {
    /// `probe` is a `host:port` pair; `rejoin_command` may be empty
    pub fn new(probe: impl Into<String>, rejoin_command: Vec<String>) -> Self {
        Self {
            probe: probe.into(),
            rejoin_command,
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl NetworkLink for ProbeNetwork {
    async fn is_available(&self) -> bool {
        match timeout(self.timeout, lookup_host(self.probe.as_str())).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                debug!("Network probe {} failed: {}", self.probe, e);
                false
            }
            Err(_) => {
                debug!("Network probe {} timed out", self.probe);
                false
            }
        }
    }

    async fn rejoin(&self) {
        let Some((program, args)) = self.rejoin_command.split_first() else {
            return;
        };
        match Command::new(program).args(args).status().await {
            Ok(status) if status.success() => debug!("Network rejoin requested"),
            Ok(status) => warn!("Network rejoin command exited with {}", status),
            Err(e) => warn!("Failed to run network rejoin command: {}", e),
        }
    }
}
