//! MQTT transport on top of rumqttc
//!
//! rumqttc drives the socket from its event loop, so every operation here
//! polls the loop until the matching acknowledgement shows up. Publishes
//! that arrive while waiting for an acknowledgement are queued and handed
//! out by later `poll` calls, keeping arrival order.

use crate::transport::traits::{PubSubTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use iotdm_shared::{timing, Endpoint, InboundMessage, SessionCredentials};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, SubscribeReasonCode, Transport,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Timeouts and sizing for the MQTT transport
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    /// Socket open timeout
    pub connect_timeout: Duration,
    /// How long to wait for CONNACK/SUBACK/publish flush
    pub ack_timeout: Duration,
    /// How long a single `poll` waits for traffic
    pub poll_timeout: Duration,
    pub keep_alive: Duration,
    /// Capacity of the rumqttc request channel
    pub request_capacity: usize,
    /// PEM file with the CA that signs the broker certificate; the default
    /// webpki roots are used when unset
    pub ca_path: Option<PathBuf>,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_millis(100),
            keep_alive: Duration::from_secs(timing::KEEP_ALIVE_SECS),
            request_capacity: 16,
            ca_path: None,
        }
    }
}

/// rumqttc-backed pub/sub transport
pub struct MqttTransport {
    config: MqttTransportConfig,
    endpoint: Option<Endpoint>,
    client: Option<AsyncClient>,
    event_loop: Option<EventLoop>,
    inbox: VecDeque<InboundMessage>,
    connected: bool,
}

impl MqttTransport {
    pub fn new(config: MqttTransportConfig) -> Self {
        Self {
            config,
            endpoint: None,
            client: None,
            event_loop: None,
            inbox: VecDeque::new(),
            connected: false,
        }
    }

    fn options(&self, endpoint: &Endpoint, credentials: &SessionCredentials) -> MqttOptions {
        let mut options =
            MqttOptions::new(credentials.client_id.clone(), endpoint.host.clone(), endpoint.port);
        options
            .set_keep_alive(self.config.keep_alive)
            .set_clean_session(true);

        if let Some(username) = &credentials.username {
            options.set_credentials(
                username.clone(),
                credentials.password.clone().unwrap_or_default(),
            );
        }
        options
    }

    async fn tls_transport(config: &MqttTransportConfig) -> Result<Transport, TransportError> {
        let Some(path) = &config.ca_path else {
            return Ok(Transport::tls_with_default_config());
        };
        let ca = tokio::fs::read(path)
            .await
            .map_err(|e| TransportError::Io(format!("{}: {}", path.display(), e)))?;
        debug!("Trusting broker CA from {}", path.display());
        Ok(Transport::tls(ca, None, None))
    }

    /// Poll the event loop until `accept` returns a result, queueing any
    /// inbound publishes seen on the way
    async fn drive<T>(
        &mut self,
        waiting_for: &'static str,
        mut accept: impl FnMut(&Event) -> Option<Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        let event_loop = self.event_loop.as_mut().ok_or(TransportError::NotConnected)?;
        let inbox = &mut self.inbox;

        let waited = timeout(self.config.ack_timeout, async {
            loop {
                let event = event_loop.poll().await.map_err(map_connection_error)?;
                if let Event::Incoming(Packet::Publish(publish)) = &event {
                    inbox.push_back(InboundMessage::new(
                        publish.topic.clone(),
                        publish.payload.clone(),
                    ));
                }
                if let Some(result) = accept(&event) {
                    return result;
                }
            }
        })
        .await;

        let result = waited.unwrap_or(Err(TransportError::Timeout(waiting_for)));
        if matches!(
            result,
            Err(TransportError::NotConnected | TransportError::Io(_) | TransportError::Timeout(_))
        ) {
            self.connected = false;
        }
        result
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let address = (endpoint.host.as_str(), endpoint.port);
        match timeout(self.config.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_probe)) => {
                self.endpoint = Some(endpoint.clone());
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::Io(e.to_string())),
            Err(_) => Err(TransportError::Timeout("socket")),
        }
    }

    async fn connect(&mut self, credentials: &SessionCredentials) -> Result<(), TransportError> {
        let endpoint = self.endpoint.clone().ok_or(TransportError::NotConnected)?;
        let mut options = self.options(&endpoint, credentials);
        if endpoint.tls {
            options.set_transport(Self::tls_transport(&self.config).await?);
        }
        let (client, event_loop) = AsyncClient::new(options, self.config.request_capacity);

        self.client = Some(client);
        self.event_loop = Some(event_loop);
        self.inbox.clear();

        self.drive("CONNACK", |event| match event {
            Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
                Some(Ok(()))
            }
            Event::Incoming(Packet::ConnAck(ack)) => {
                Some(Err(TransportError::Refused(format!("{:?}", ack.code))))
            }
            _ => None,
        })
        .await?;

        self.connected = true;
        debug!("MQTT session up with {}", endpoint);
        Ok(())
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        client
            .subscribe(channel, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let refused = TransportError::SubscriptionRefused(channel.to_string());
        self.drive("SUBACK", |event| match event {
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    Some(Err(refused.clone()))
                } else {
                    Some(Ok(()))
                }
            }
            _ => None,
        })
        .await
    }

    async fn publish(&mut self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        client
            .publish(channel, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        self.drive("publish flush", |event| match event {
            Event::Outgoing(Outgoing::Publish(_)) => Some(Ok(())),
            _ => None,
        })
        .await
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        if let Some(message) = self.inbox.pop_front() {
            return Ok(Some(message));
        }
        let event_loop = self.event_loop.as_mut().ok_or(TransportError::NotConnected)?;

        match timeout(self.config.poll_timeout, event_loop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => Ok(Some(InboundMessage::new(
                publish.topic,
                publish.payload,
            ))),
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                warn!("Disconnected by broker");
                self.connected = false;
                Err(TransportError::NotConnected)
            }
            Ok(Ok(_)) => Ok(None),
            Ok(Err(e)) => {
                self.connected = false;
                Err(map_connection_error(e))
            }
            // Nothing arrived within the poll window
            Err(_) => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                debug!("Error sending disconnect packet: {}", e);
            }
        }
        self.event_loop = None;
        self.inbox.clear();
        self.connected = false;
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// Map rumqttc's connection errors onto transport conditions
fn map_connection_error(err: ConnectionError) -> TransportError {
    match err {
        ConnectionError::Io(_) | ConnectionError::NetworkTimeout => TransportError::NotConnected,
        ConnectionError::ConnectionRefused(code) => TransportError::Refused(format!("{:?}", code)),
        ConnectionError::FlushTimeout => TransportError::Timeout("socket flush"),
        other => TransportError::Protocol(other.to_string()),
    }
}
