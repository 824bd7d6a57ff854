//! Transport trait abstraction for pluggable pub/sub backends

use async_trait::async_trait;
use bytes::Bytes;
use iotdm_shared::{Endpoint, InboundMessage, SessionCredentials};
use thiserror::Error;

/// Failures reported by a pub/sub transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying socket is gone and has to be re-opened
    #[error("transport not connected")]
    NotConnected,

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("subscription to {0} refused")]
    SubscriptionRefused(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A publish/subscribe session with the platform broker.
///
/// Calls are awaited one at a time by the device loop; an implementation
/// never needs to handle concurrent use.
#[async_trait]
pub trait PubSubTransport: Send {
    /// Open the socket to the broker
    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Run the session handshake over the opened socket
    async fn connect(&mut self, credentials: &SessionCredentials) -> Result<(), TransportError>;

    /// Subscribe and wait for the broker's acknowledgement
    async fn subscribe(&mut self, channel: &str) -> Result<(), TransportError>;

    async fn publish(&mut self, channel: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Deliver at most one inbound message
    async fn poll(&mut self) -> Result<Option<InboundMessage>, TransportError>;

    fn is_connected(&self) -> bool;

    /// Tear the session down; best effort
    async fn disconnect(&mut self);

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
