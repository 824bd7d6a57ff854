//! Command dispatcher - classifies, decodes and routes inbound messages

use super::handlers::{self, HandlerContext, INFORMATION_ERROR};
use crate::context::BUILD_ID;
use crate::platform::RebootReason;
use iotdm_shared::payload::{self, DeviceCommand};
use iotdm_shared::{codec, ChannelKind, InboundMessage};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command completed successfully
    Completed { message: String },
    /// Command accepted but execution failed
    Failed { message: String },
    /// Command payload failed validation
    Rejected { message: String },
    /// Nothing to do for this payload
    Ignored,
    /// Command finished and the device has to restart
    Reboot(RebootReason),
}

/// What became of one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Unknown channel or nothing for the built-in handlers in the payload
    Ignored,
    Handled,
    /// Payload could not be decoded; reported and discarded
    Dropped,
    /// Stop processing and restart the device
    Reboot(RebootReason),
}

/// Routes inbound messages to their handlers, one at a time
pub struct CommandDispatcher {
    build_id: String,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(BUILD_ID)
    }
}

impl CommandDispatcher {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
        }
    }

    /// Handle one inbound message to completion
    pub async fn dispatch(
        &self,
        ctx: &mut HandlerContext<'_>,
        message: InboundMessage,
    ) -> DispatchOutcome {
        let Some(kind) = ctx.device.topics.classify(&message.channel) else {
            debug!("Ignoring message on {}", message.channel);
            return DispatchOutcome::Ignored;
        };

        let body = match codec::decode(&message.payload) {
            Ok(body) => body,
            Err(e) => {
                ctx.device
                    .diagnostics
                    .error(
                        ctx.transport,
                        &format!("Payload on {} not decoded: {}", message.channel, e),
                    )
                    .await;
                return DispatchOutcome::Dropped;
            }
        };

        debug!("Dispatching {:?} from {}", kind, message.channel);
        let result = match kind {
            ChannelKind::ManagementResponse => {
                debug!("Management response: {}", serde_json::Value::Object(body));
                CommandResult::Ignored
            }
            ChannelKind::RebootRequest => handlers::handle_reboot(ctx).await,
            ChannelKind::FactoryResetRequest => handlers::handle_factory_reset(ctx).await,
            ChannelKind::UpdateNotify => handlers::handle_device_update(ctx, &body).await,
            ChannelKind::Command => {
                let result = self.handle_device_command(ctx, &body).await;
                if !matches!(result, CommandResult::Reboot(_)) {
                    ctx.application.handle_command(&body);
                }
                result
            }
        };

        self.finish(ctx, result).await
    }

    /// Generic device command: `upgrade` wins over `config`
    async fn handle_device_command(
        &self,
        ctx: &mut HandlerContext<'_>,
        body: &Map<String, Value>,
    ) -> CommandResult {
        match payload::parse_device_command(body) {
            Ok(Some(DeviceCommand::Upgrade(request))) => {
                handlers::handle_upgrade(ctx, &request).await
            }
            Ok(Some(DeviceCommand::Config)) => {
                handlers::handle_config_request(ctx, &self.build_id).await
            }
            Ok(None) => CommandResult::Ignored,
            Err(e) => {
                warn!("Upgrade command rejected: {}", e);
                CommandResult::Rejected {
                    message: INFORMATION_ERROR.into(),
                }
            }
        }
    }

    async fn finish(&self, ctx: &mut HandlerContext<'_>, result: CommandResult) -> DispatchOutcome {
        match result {
            CommandResult::Completed { message } => {
                info!("  Command completed: {}", message);
                DispatchOutcome::Handled
            }
            CommandResult::Failed { message } | CommandResult::Rejected { message } => {
                ctx.device.diagnostics.error(ctx.transport, &message).await;
                DispatchOutcome::Handled
            }
            CommandResult::Ignored => DispatchOutcome::Ignored,
            CommandResult::Reboot(reason) => DispatchOutcome::Reboot(reason),
        }
    }
}
