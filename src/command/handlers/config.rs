//! Configuration introspection handler

use super::HandlerContext;
use crate::command::CommandResult;
use serde_json::Value;

/// Snapshot key carrying the running build
pub const BUILD_KEY: &str = "build";

/// Publish the masked configuration, tagged with the running build.
///
/// The build id goes into the snapshot copy only; the stored document is
/// left untouched.
pub async fn handle_config_request(ctx: &mut HandlerContext<'_>, build_id: &str) -> CommandResult {
    let mut snapshot = ctx.device.config.as_map().clone();
    snapshot.insert(BUILD_KEY.into(), Value::String(build_id.into()));
    let masked = ctx.store.mask_secrets(&snapshot);

    if ctx.device.diagnostics.config(ctx.transport, masked).await {
        CommandResult::Completed {
            message: "Configuration snapshot published".into(),
        }
    } else {
        CommandResult::Completed {
            message: "Configuration snapshot not delivered".into(),
        }
    }
}
