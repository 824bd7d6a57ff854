//! Management handshake
//!
//! After the broker accepts the session the device subscribes to its five
//! management and command channels, one at a time and in a fixed order, and
//! then announces itself. The session only counts as established once every
//! subscription has been acknowledged.

use crate::context::DeviceContext;
use crate::transport::{PubSubTransport, TransportError};
use iotdm_shared::{codec, Metadata};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("subscription to {channel} failed: {source}")]
pub struct HandshakeError {
    pub channel: String,
    #[source]
    pub source: TransportError,
}

/// Body of the manage request announcing this device
pub fn registration_payload(metadata: &Metadata) -> Value {
    json!({
        "d": {
            "metadata": metadata,
            "supports": { "deviceActions": true }
        }
    })
}

/// Subscribe to every handshake channel, then announce the device.
///
/// Stops at the first refused subscription; nothing is published in that
/// case. Announcement failures are logged and do not fail the handshake.
pub async fn establish(
    device: &DeviceContext,
    transport: &mut dyn PubSubTransport,
) -> Result<(), HandshakeError> {
    for channel in device.topics.handshake_subscriptions() {
        if let Err(source) = transport.subscribe(channel).await {
            warn!("Subscription to {} failed: {}", channel, source);
            return Err(HandshakeError {
                channel: channel.to_string(),
                source,
            });
        }
        info!("Subscription to {} OK", channel);
    }

    announce(device, transport).await;
    Ok(())
}

async fn announce(device: &DeviceContext, transport: &mut dyn PubSubTransport) {
    let registration = registration_payload(&device.metadata);
    let encoded = match codec::encode(&registration) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Registration not encoded: {}", e);
            return;
        }
    };

    info!("Publishing device registration to {}", device.topics.manage);
    if let Err(e) = transport.publish(&device.topics.manage, encoded).await {
        warn!("Device registration failed: {}", e);
        return;
    }

    device
        .diagnostics
        .info(transport, registration["d"].clone())
        .await;
}
