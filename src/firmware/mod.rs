//! Firmware retrieval and installation

mod http;

pub use http::HttpFirmwareUpdater;

use async_trait::async_trait;
use iotdm_shared::UpgradeRequest;

/// Outcome of one fetch-and-apply attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareOutcome {
    Failed { reason: String },
    /// The server has nothing newer than the running build
    NoUpdateAvailable,
    /// A new image is installed and takes effect after reboot
    Applied,
}

#[async_trait]
pub trait FirmwareUpdater: Send {
    /// Fetch the image named by `request` and install it
    async fn fetch_and_apply(&mut self, request: &UpgradeRequest) -> FirmwareOutcome;
}
