//! Broker transport and host network link
//!
//! The rest of the device only talks to the `PubSubTransport` and
//! `NetworkLink` traits; MQTT and the DNS probe are the production backends.

pub mod mqtt;
pub mod network;
pub mod traits;

pub use mqtt::{MqttTransport, MqttTransportConfig};
pub use network::{NetworkLink, ProbeNetwork};
pub use traits::{PubSubTransport, TransportError};
