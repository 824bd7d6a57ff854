//! Firmware upgrade handler

use super::HandlerContext;
use crate::command::CommandResult;
use crate::firmware::FirmwareOutcome;
use crate::platform::RebootReason;
use iotdm_shared::UpgradeRequest;
use serde_json::json;
use tracing::{info, warn};

/// Diagnostic reported for an upgrade command with missing or invalid fields
pub const INFORMATION_ERROR: &str = "OTA Information Error";

const UPGRADE_NOTICE: &str = "Device will be upgraded.";
const NO_UPDATE_NOTICE: &str = "[update] Update no Update.";

/// Announce the upgrade, then fetch and apply the image once
pub async fn handle_upgrade(ctx: &mut HandlerContext<'_>, request: &UpgradeRequest) -> CommandResult {
    let url = request.url();
    info!("  [UPGRADE] Firmware upgrade from {}", url);

    ctx.device
        .diagnostics
        .info(ctx.transport, json!({ "upgrade": UPGRADE_NOTICE }))
        .await;

    match ctx.firmware.fetch_and_apply(request).await {
        FirmwareOutcome::Applied => {
            info!("  [UPGRADE] Update ok");
            CommandResult::Reboot(RebootReason::FirmwareApplied)
        }
        FirmwareOutcome::NoUpdateAvailable => {
            ctx.device
                .diagnostics
                .info(ctx.transport, json!({ "upgrade": NO_UPDATE_NOTICE }))
                .await;
            CommandResult::Completed {
                message: "No newer firmware available".into(),
            }
        }
        FirmwareOutcome::Failed { reason } => {
            warn!("  [UPGRADE] Update from {} failed: {}", url, reason);
            CommandResult::Failed {
                message: format!("[update] Update failed. {}", url),
            }
        }
    }
}
