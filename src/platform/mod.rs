//! Host platform services: reset signal and reboot

mod system;

pub use system::SystemPlatform;

use async_trait::async_trait;
use std::fmt;

/// Why the device is restarting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootReason {
    /// The platform sent a reboot request
    RemoteRequest,
    /// Configuration was wiped by a factory reset request
    FactoryReset,
    /// A new firmware image was installed
    FirmwareApplied,
    /// The local reset signal was asserted while offline
    ResetSignal,
    /// The network stayed unavailable for too long
    NetworkLoss,
}

impl fmt::Display for RebootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebootReason::RemoteRequest => write!(f, "remote reboot request"),
            RebootReason::FactoryReset => write!(f, "factory reset"),
            RebootReason::FirmwareApplied => write!(f, "firmware update applied"),
            RebootReason::ResetSignal => write!(f, "reset signal asserted"),
            RebootReason::NetworkLoss => write!(f, "network unavailable too long"),
        }
    }
}

/// Host facilities the device needs beyond networking
#[async_trait]
pub trait Platform: Send + Sync {
    /// Whether the local reset/provisioning signal is asserted
    async fn reset_requested(&self) -> bool;

    /// Restart the device
    async fn reboot(&self, reason: RebootReason) -> anyhow::Result<()>;
}
