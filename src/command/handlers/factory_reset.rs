//! Factory reset handler

use super::HandlerContext;
use crate::command::CommandResult;
use crate::platform::RebootReason;
use tracing::{error, warn};

/// Wipe the stored configuration and reboot into provisioning.
///
/// The reboot goes ahead even if the wipe fails; a device that was told to
/// forget its configuration must not keep running with it.
pub async fn handle_factory_reset(ctx: &mut HandlerContext<'_>) -> CommandResult {
    warn!("[FACTORY_RESET] Clearing stored configuration");
    if let Err(e) = ctx.store.clear().await {
        error!("[FACTORY_RESET] Failed to clear configuration: {}", e);
    }
    CommandResult::Reboot(RebootReason::FactoryReset)
}
