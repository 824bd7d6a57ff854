//! Device main loop
//!
//! One cooperative loop on the current thread: service the connection,
//! handle at most one inbound message, then publish status when it is due.
//! Everything is awaited in place, so messages are handled strictly one
//! at a time in arrival order.

use crate::application::DeviceApplication;
use crate::command::handlers::HandlerContext;
use crate::command::{CommandDispatcher, DispatchOutcome};
use crate::connection::{ConnectionConfig, ConnectionManager, ServiceOutcome};
use crate::context::{DeviceContext, BUILD_ID};
use crate::firmware::FirmwareUpdater;
use crate::platform::{Platform, RebootReason};
use crate::store::ConfigStore;
use crate::transport::{NetworkLink, PubSubTransport};
use anyhow::Result;
use iotdm_shared::codec;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// External services the device loop drives
pub struct Collaborators {
    pub transport: Box<dyn PubSubTransport>,
    pub network: Box<dyn NetworkLink>,
    pub platform: Box<dyn Platform>,
    pub store: Box<dyn ConfigStore>,
    pub firmware: Box<dyn FirmwareUpdater>,
    pub application: Box<dyn DeviceApplication>,
}

pub struct DeviceRuntime {
    device: DeviceContext,
    connection: ConnectionManager,
    dispatcher: CommandDispatcher,
    links: Collaborators,
    started: Instant,
    last_status: Option<Instant>,
}

impl DeviceRuntime {
    pub fn new(device: DeviceContext, config: ConnectionConfig, links: Collaborators) -> Self {
        Self {
            device,
            connection: ConnectionManager::new(config),
            dispatcher: CommandDispatcher::new(BUILD_ID),
            links,
            started: Instant::now(),
            last_status: None,
        }
    }

    /// Run until a reboot is required, then reboot through the platform
    pub async fn run(mut self) -> Result<RebootReason> {
        let reason = loop {
            if let Some(reason) = self.step().await {
                break reason;
            }
        };

        info!("Rebooting: {}", reason);
        self.links.transport.disconnect().await;
        self.links.platform.reboot(reason).await?;
        Ok(reason)
    }

    /// One loop iteration; returns the reboot reason once one is required
    pub async fn step(&mut self) -> Option<RebootReason> {
        let outcome = self
            .connection
            .service(
                &self.device,
                self.links.transport.as_mut(),
                self.links.network.as_ref(),
                self.links.platform.as_ref(),
            )
            .await;
        match outcome {
            ServiceOutcome::Ready => {}
            ServiceOutcome::Pending => return None,
            ServiceOutcome::Reboot(reason) => return Some(reason),
        }

        match self.links.transport.poll().await {
            Ok(Some(message)) => {
                let mut ctx = HandlerContext {
                    device: &mut self.device,
                    transport: self.links.transport.as_mut(),
                    store: self.links.store.as_ref(),
                    firmware: self.links.firmware.as_mut(),
                    application: self.links.application.as_mut(),
                };
                if let DispatchOutcome::Reboot(reason) =
                    self.dispatcher.dispatch(&mut ctx, message).await
                {
                    return Some(reason);
                }
            }
            Ok(None) => {}
            Err(e) => {
                // The connection manager notices the dead session next step
                warn!("Receive on {} failed: {}", self.links.transport.name(), e);
                return None;
            }
        }

        self.publish_status_if_due().await;
        None
    }

    async fn publish_status_if_due(&mut self) {
        let Some(interval) = self.device.publish_interval else {
            return;
        };
        if self
            .last_status
            .is_some_and(|last| last.elapsed() < interval)
        {
            return;
        }

        let payload = self.links.application.status(self.started.elapsed());
        self.last_status = Some(Instant::now());
        let encoded = match codec::encode(&payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Status not encoded: {}", e);
                return;
            }
        };
        match self
            .links
            .transport
            .publish(&self.device.topics.status, encoded)
            .await
        {
            Ok(()) => debug!("Published status to {}", self.device.topics.status),
            Err(e) => warn!("Status publish failed: {}", e),
        }
    }
}
