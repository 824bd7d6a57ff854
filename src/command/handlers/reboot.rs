//! Reboot request handler

use super::HandlerContext;
use crate::command::CommandResult;
use crate::platform::RebootReason;
use tracing::info;

/// Handle a platform-initiated reboot
pub async fn handle_reboot(ctx: &mut HandlerContext<'_>) -> CommandResult {
    info!(
        "[REBOOT] Reboot requested for {}",
        ctx.device.identity.device_id
    );
    CommandResult::Reboot(RebootReason::RemoteRequest)
}
