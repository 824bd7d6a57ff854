//! Command handlers for the management and device command channels

mod config;
mod factory_reset;
mod metadata;
mod reboot;
mod upgrade;

pub use config::handle_config_request;
pub use factory_reset::handle_factory_reset;
pub use metadata::handle_device_update;
pub use reboot::handle_reboot;
pub use upgrade::{handle_upgrade, INFORMATION_ERROR};

use crate::application::DeviceApplication;
use crate::context::DeviceContext;
use crate::firmware::FirmwareUpdater;
use crate::store::ConfigStore;
use crate::transport::PubSubTransport;

/// Context passed to command handlers
pub struct HandlerContext<'a> {
    pub device: &'a mut DeviceContext,
    pub transport: &'a mut dyn PubSubTransport,
    pub store: &'a dyn ConfigStore,
    pub firmware: &'a mut dyn FirmwareUpdater,
    pub application: &'a mut dyn DeviceApplication,
}
