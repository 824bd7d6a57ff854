//! IoT Device-Management Shared Types
//!
//! This crate provides the pure protocol layer of the device-management
//! client: device identity and operating mode, the control-plane topic
//! namespace, the JSON codec, typed command payloads and the connection
//! state machine. Nothing in here performs I/O.

pub mod codec;
pub mod identity;
pub mod payload;
pub mod state_machine;
pub mod topics;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub use identity::{DeviceIdentity, Endpoint, OperatingMode, SessionCredentials};
pub use payload::{CommandError, DeviceCommand, UpgradeRequest};
pub use topics::{ChannelKind, TopicSet};

/// Timing parameters for the connection lifecycle
pub mod timing {
    /// Fixed delay between failed connection attempts
    pub const RETRY_DELAY_MS: u64 = 5_000;

    /// Continuous network loss after which the device reboots
    pub const NETWORK_LOSS_REBOOT_MS: u64 = 60 * 60 * 1_000;

    /// Keep-alive interval negotiated with the broker
    pub const KEEP_ALIVE_SECS: u64 = 30;
}

/// Metadata key holding the status publish interval in milliseconds
pub const PUBLISH_INTERVAL_KEY: &str = "pubInterval";

/// Device metadata, kept in insertion order.
///
/// Sourced from the `meta` section of the persisted configuration and
/// replaced wholesale by the platform's update command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new(entries: Map<String, Value>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Status publish cadence, or `None` when disabled.
    ///
    /// The platform sends the interval either as a number or as a numeric
    /// string; anything unparseable counts as zero.
    pub fn publish_interval(&self) -> Option<Duration> {
        let millis = match self.0.get(PUBLISH_INTERVAL_KEY)? {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
            _ => 0,
        };
        (millis > 0).then(|| Duration::from_millis(millis))
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(entries: Map<String, Value>) -> Self {
        Self(entries)
    }
}

/// A message delivered by the transport, held only for one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}
