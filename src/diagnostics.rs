//! Best-effort reporting on the device's info channel
//!
//! A failed diagnostic publish is logged and otherwise ignored; reporting a
//! problem must never create a new one.

use crate::transport::PubSubTransport;
use iotdm_shared::codec;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

pub struct DiagnosticsPublisher {
    info_topic: String,
}

impl DiagnosticsPublisher {
    pub fn new(info_topic: impl Into<String>) -> Self {
        Self {
            info_topic: info_topic.into(),
        }
    }

    /// Publish `{"info":{"error":message}}`
    pub async fn error(&self, transport: &mut dyn PubSubTransport, message: &str) -> bool {
        warn!("{}", message);
        self.send(transport, &json!({ "info": { "error": message } }))
            .await
    }

    /// Publish `{"info":payload}`
    pub async fn info(&self, transport: &mut dyn PubSubTransport, payload: Value) -> bool {
        self.send(transport, &json!({ "info": payload })).await
    }

    /// Publish `{"config":snapshot}`; the snapshot must already be masked
    pub async fn config(
        &self,
        transport: &mut dyn PubSubTransport,
        snapshot: Map<String, Value>,
    ) -> bool {
        self.send(transport, &json!({ "config": snapshot })).await
    }

    async fn send(&self, transport: &mut dyn PubSubTransport, payload: &Value) -> bool {
        let encoded = match codec::encode(payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Diagnostic not encoded: {}", e);
                return false;
            }
        };
        match transport.publish(&self.info_topic, encoded).await {
            Ok(()) => {
                debug!("Published diagnostic to {}", self.info_topic);
                true
            }
            Err(e) => {
                warn!("Publish to {} failed: {}", self.info_topic, e);
                false
            }
        }
    }
}
