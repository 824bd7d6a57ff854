//! Connection manager: drives the session lifecycle one step at a time

use crate::context::DeviceContext;
use crate::platform::{Platform, RebootReason};
use crate::session;
use crate::transport::{NetworkLink, PubSubTransport, TransportError};
use iotdm_shared::state_machine::{
    ConnectionEvent, ConnectionState, ConnectionStateMachine, TransitionResult,
};
use iotdm_shared::timing;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for the connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fixed delay after a failed attempt
    pub retry_delay: Duration,
    /// Continuous network loss after which the device reboots
    pub network_loss_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(timing::RETRY_DELAY_MS),
            network_loss_timeout: Duration::from_millis(timing::NETWORK_LOSS_REBOOT_MS),
        }
    }
}

/// Result of one service step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// The session is established; inbound traffic may be processed
    Ready,
    /// Still connecting; call again
    Pending,
    /// The device has to restart
    Reboot(RebootReason),
}

/// Owns the connection state machine and performs the I/O each state needs
pub struct ConnectionManager {
    config: ConnectionConfig,
    fsm: ConnectionStateMachine,
    started: Instant,
    /// A rejoin was issued for the current outage
    rejoined: bool,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let limit_ms = config.network_loss_timeout.as_millis() as u64;
        Self {
            config,
            fsm: ConnectionStateMachine::with_network_loss_limit(limit_ms),
            started: Instant::now(),
            rejoined: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.fsm.state()
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn apply(&mut self, event: ConnectionEvent) {
        let from = self.fsm.state();
        match self.fsm.process_event(event, self.now_ms()) {
            TransitionResult::Success(to) if to != from => {
                debug!("Connection state: {:?} -> {:?}", from, to);
            }
            TransitionResult::Success(_) => {}
            TransitionResult::Invalid { from, event } => {
                warn!("Ignoring {:?} in state {:?}", event, from);
            }
        }
    }

    /// Advance the connection by one step.
    ///
    /// Returns `Ready` only when the session is established and still
    /// connected. Waiting between failed attempts happens inside this call.
    pub async fn service(
        &mut self,
        device: &DeviceContext,
        transport: &mut dyn PubSubTransport,
        network: &dyn NetworkLink,
        platform: &dyn Platform,
    ) -> ServiceOutcome {
        match self.fsm.state() {
            ConnectionState::Idle => {
                info!("Connecting to {} as {}", device.endpoint, device.credentials.client_id);
                self.apply(ConnectionEvent::Started);
                ServiceOutcome::Pending
            }
            ConnectionState::AwaitingNetwork => self.await_network(network, platform).await,
            ConnectionState::AwaitingTransport => {
                self.open_transport(device, transport, network).await
            }
            ConnectionState::AwaitingSession => {
                self.open_session(device, transport, network).await
            }
            ConnectionState::Established => {
                if transport.is_connected() {
                    return ServiceOutcome::Ready;
                }
                warn!("Session with {} lost", device.endpoint);
                transport.disconnect().await;
                self.apply(ConnectionEvent::SessionLost);
                ServiceOutcome::Pending
            }
        }
    }

    async fn await_network(
        &mut self,
        network: &dyn NetworkLink,
        platform: &dyn Platform,
    ) -> ServiceOutcome {
        if network.is_available().await {
            info!("Network available");
            self.rejoined = false;
            self.apply(ConnectionEvent::NetworkAvailable);
            return ServiceOutcome::Pending;
        }

        // Rejoin once per outage; later checks only wait for the link
        if !self.rejoined {
            warn!("Network unavailable, rejoining");
            network.rejoin().await;
            self.rejoined = true;
        } else {
            debug!("Network still unavailable");
        }
        self.apply(ConnectionEvent::NetworkUnavailable);
        sleep(self.config.retry_delay).await;

        if platform.reset_requested().await {
            warn!("Reset signal asserted while offline");
            return ServiceOutcome::Reboot(RebootReason::ResetSignal);
        }
        if self.fsm.is_network_loss_unrecoverable(self.now_ms()) {
            error!(
                "Network unavailable for more than {:?}",
                self.config.network_loss_timeout
            );
            return ServiceOutcome::Reboot(RebootReason::NetworkLoss);
        }
        ServiceOutcome::Pending
    }

    async fn open_transport(
        &mut self,
        device: &DeviceContext,
        transport: &mut dyn PubSubTransport,
        network: &dyn NetworkLink,
    ) -> ServiceOutcome {
        match transport.open(&device.endpoint).await {
            Ok(()) => {
                debug!("Socket open to {}", device.endpoint);
                self.apply(ConnectionEvent::TransportOpened);
            }
            Err(e) => {
                warn!(
                    "Connection to {} failed: {}, retrying in {:?}",
                    device.endpoint, e, self.config.retry_delay
                );
                self.apply(ConnectionEvent::TransportFailed);
                self.retry_after_failure(network).await;
            }
        }
        ServiceOutcome::Pending
    }

    async fn open_session(
        &mut self,
        device: &DeviceContext,
        transport: &mut dyn PubSubTransport,
        network: &dyn NetworkLink,
    ) -> ServiceOutcome {
        match transport.connect(&device.credentials).await {
            Ok(()) => {}
            Err(TransportError::NotConnected) => {
                warn!("Socket closed before the session started, reopening");
                self.apply(ConnectionEvent::TransportNotConnected);
                sleep(self.config.retry_delay).await;
                return ServiceOutcome::Pending;
            }
            Err(e) => {
                warn!(
                    "Session with {} failed: {}, retrying in {:?}",
                    device.endpoint, e, self.config.retry_delay
                );
                self.apply(ConnectionEvent::SessionRejected);
                self.retry_after_failure(network).await;
                return ServiceOutcome::Pending;
            }
        }

        info!("Session accepted by {} ({})", device.endpoint, transport.name());
        match session::establish(device, transport).await {
            Ok(()) => {
                self.apply(ConnectionEvent::HandshakeComplete);
                info!("Device management session established");
                ServiceOutcome::Ready
            }
            Err(e) => {
                warn!("Management handshake failed: {}", e);
                transport.disconnect().await;
                self.apply(ConnectionEvent::SubscriptionFailed);
                sleep(self.config.retry_delay).await;
                ServiceOutcome::Pending
            }
        }
    }

    /// Wait out the retry delay, then fall back to the network check if
    /// connectivity went away in the meantime
    async fn retry_after_failure(&mut self, network: &dyn NetworkLink) {
        sleep(self.config.retry_delay).await;
        if !network.is_available().await {
            self.apply(ConnectionEvent::NetworkUnavailable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_device, FakeNetwork, FakePlatform, FakeTransport, TransportOp};

    struct Rig {
        manager: ConnectionManager,
        device: DeviceContext,
        transport: FakeTransport,
        network: FakeNetwork,
        platform: FakePlatform,
    }

    impl Rig {
        fn new(network: FakeNetwork) -> Self {
            Self {
                manager: ConnectionManager::new(ConnectionConfig::default()),
                device: sample_device("abc123"),
                transport: FakeTransport::new(),
                network,
                platform: FakePlatform::new(),
            }
        }

        async fn step(&mut self) -> ServiceOutcome {
            self.manager
                .service(
                    &self.device,
                    &mut self.transport,
                    &self.network,
                    &self.platform,
                )
                .await
        }

        /// Step until something other than `Pending` comes back
        async fn settle(&mut self, max_steps: usize) -> ServiceOutcome {
            for _ in 0..max_steps {
                let outcome = self.step().await;
                if outcome != ServiceOutcome::Pending {
                    return outcome;
                }
            }
            ServiceOutcome::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_when_everything_works() {
        let mut rig = Rig::new(FakeNetwork::up());

        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        assert_eq!(rig.manager.state(), ConnectionState::Established);
        assert_eq!(rig.transport.subscriptions().len(), 5);
        assert_eq!(rig.transport.published().len(), 2);

        // Established stays ready without touching the transport again
        rig.transport.clear_journal();
        assert_eq!(rig.step().await, ServiceOutcome::Ready);
        assert!(rig.transport.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_waits_fixed_delay() {
        let mut rig = Rig::new(FakeNetwork::up());
        rig.transport.script_open([
            Err(TransportError::Io("refused".into())),
            Err(TransportError::Io("refused".into())),
        ]);

        let start = Instant::now();
        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        assert_eq!(rig.transport.count(&TransportOp::Open), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_session_retries_handshake_only() {
        let mut rig = Rig::new(FakeNetwork::up());
        rig.transport
            .script_connect([Err(TransportError::Refused("NotAuthorized".into()))]);

        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        assert_eq!(rig.transport.count(&TransportOp::Open), 1);
        assert_eq!(rig.transport.count(&TransportOp::Connect), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_connected_reopens_socket() {
        let mut rig = Rig::new(FakeNetwork::up());
        rig.transport.script_connect([Err(TransportError::NotConnected)]);

        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        assert_eq!(rig.transport.count(&TransportOp::Open), 2);
        assert_eq!(rig.transport.count(&TransportOp::Connect), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_subscription_is_not_established() {
        let channels = sample_device("abc123").topics.handshake_subscriptions().map(String::from);
        for channel in channels {
            let mut rig = Rig::new(FakeNetwork::up());
            rig.transport.refuse_subscription(Some(channel.as_str()));

            assert_eq!(rig.settle(4).await, ServiceOutcome::Pending, "{}", channel);
            assert_eq!(
                rig.manager.state(),
                ConnectionState::AwaitingNetwork,
                "{}",
                channel
            );
            assert!(rig.transport.published().is_empty());
            assert_eq!(rig.transport.count(&TransportOp::Disconnect), 1);

            // Once the broker accepts every channel the device comes up
            rig.transport.refuse_subscription(None);
            assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_loss_restarts_from_network_check() {
        let mut rig = Rig::new(FakeNetwork::up());
        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);

        rig.transport.drop_session();
        let checks = rig.network.checks();
        assert_eq!(rig.step().await, ServiceOutcome::Pending);
        assert_eq!(rig.manager.state(), ConnectionState::AwaitingNetwork);

        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        assert!(rig.network.checks() > checks);
        assert_eq!(rig.transport.count(&TransportOp::Open), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_loss_reboots_after_an_hour() {
        let mut rig = Rig::new(FakeNetwork::down());

        let start = Instant::now();
        let outcome = rig.settle(2_000).await;
        assert_eq!(outcome, ServiceOutcome::Reboot(RebootReason::NetworkLoss));
        assert!(start.elapsed() > Duration::from_secs(3_600));
        assert!(start.elapsed() <= Duration::from_secs(3_610));
        assert_eq!(rig.network.rejoins(), 1);
        assert!(rig.transport.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_once_per_outage() {
        let mut rig = Rig::new(FakeNetwork::up());
        rig.network.script([false; 6]);

        assert_eq!(rig.settle(20).await, ServiceOutcome::Ready);
        assert_eq!(rig.network.checks(), 7);
        assert_eq!(rig.network.rejoins(), 1);

        // A later outage gets its own rejoin
        rig.transport.drop_session();
        rig.network.script([false; 3]);
        assert_eq!(rig.settle(20).await, ServiceOutcome::Ready);
        assert_eq!(rig.network.rejoins(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_outage_does_not_reboot() {
        let mut rig = Rig::new(FakeNetwork::up());
        rig.network.script([false; 100]);

        assert_eq!(rig.settle(200).await, ServiceOutcome::Ready);
        assert!(rig.platform.reboots().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_signal_checked_while_offline() {
        let mut rig = Rig::new(FakeNetwork::down());
        rig.platform.assert_reset(true);

        assert_eq!(
            rig.settle(10).await,
            ServiceOutcome::Reboot(RebootReason::ResetSignal)
        );
        assert_eq!(rig.network.rejoins(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_signal_ignored_while_online() {
        let mut rig = Rig::new(FakeNetwork::up());
        rig.platform.assert_reset(true);

        assert_eq!(rig.settle(10).await, ServiceOutcome::Ready);
        assert_eq!(rig.platform.reset_checks(), 0);
    }
}
