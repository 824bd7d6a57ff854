//! Device update handler: metadata replacement

use super::HandlerContext;
use crate::command::CommandResult;
use iotdm_shared::payload::{self, FieldChange};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Handle a device update notification.
///
/// Every `metadata` entry replaces the device metadata wholesale, so the
/// last one wins. Other fields are not managed by the device and are
/// skipped. The result is persisted with a single save.
pub async fn handle_device_update(
    ctx: &mut HandlerContext<'_>,
    body: &Map<String, Value>,
) -> CommandResult {
    let changes = match payload::parse_update_fields(body) {
        Ok(changes) => changes,
        Err(e) => {
            return CommandResult::Rejected {
                message: format!("Device update rejected: {}", e),
            }
        }
    };

    let mut replacement = None;
    for change in changes {
        match change {
            FieldChange::Metadata(metadata) => replacement = Some(metadata),
            FieldChange::Unsupported(field) => debug!("  [UPDATE] Ignoring field {}", field),
        }
    }
    let Some(metadata) = replacement else {
        return CommandResult::Ignored;
    };

    let entries = metadata.len();
    ctx.device.replace_metadata(metadata);
    info!(
        "  [UPDATE] Metadata replaced ({} entries), publish interval {:?}",
        entries, ctx.device.publish_interval
    );

    if let Err(e) = ctx.store.save(&ctx.device.config).await {
        return CommandResult::Failed {
            message: format!("Metadata not saved: {}", e),
        };
    }

    CommandResult::Completed {
        message: format!("Metadata updated with {} entries", entries),
    }
}
