//! Connection State Machine
//!
//! Defines valid connection lifecycle transitions and tracks how long the
//! network has been unavailable.

use crate::timing;

/// Lifecycle states of the control-plane connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    AwaitingNetwork,
    AwaitingTransport,
    AwaitingSession,
    Established,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Process startup
    Started,
    /// Network connectivity confirmed
    NetworkAvailable,
    /// Network connectivity check failed
    NetworkUnavailable,
    /// Socket to the broker opened
    TransportOpened,
    /// Socket could not be opened
    TransportFailed,
    /// Transport reported that the socket is not connected
    TransportNotConnected,
    /// Broker refused or failed the session handshake
    SessionRejected,
    /// A handshake subscription was not acknowledged
    SubscriptionFailed,
    /// Session accepted and all handshake subscriptions acknowledged
    HandshakeComplete,
    /// Established session dropped
    SessionLost,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid; the machine is now in this state
    Success(ConnectionState),
    /// Transition was invalid from current state
    Invalid {
        from: ConnectionState,
        event: ConnectionEvent,
    },
}

/// The connection lifecycle state machine
#[derive(Debug)]
pub struct ConnectionStateMachine {
    current_state: ConnectionState,
    /// When the current network outage began
    network_lost_since_ms: Option<u64>,
    network_loss_limit_ms: u64,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self::with_network_loss_limit(timing::NETWORK_LOSS_REBOOT_MS)
    }

    pub fn with_network_loss_limit(limit_ms: u64) -> Self {
        Self {
            current_state: ConnectionState::Idle,
            network_lost_since_ms: None,
            network_loss_limit_ms: limit_ms,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    pub fn is_established(&self) -> bool {
        self.current_state == ConnectionState::Established
    }

    /// Process an event at `now_ms` and return the transition result
    pub fn process_event(&mut self, event: ConnectionEvent, now_ms: u64) -> TransitionResult {
        match self.get_next_state(event) {
            Some(state) => {
                match state {
                    ConnectionState::AwaitingNetwork => {
                        self.network_lost_since_ms.get_or_insert(now_ms);
                    }
                    _ => self.network_lost_since_ms = None,
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self.current_state, event) {
            (Idle, Started) => Some(AwaitingNetwork),

            (AwaitingNetwork, NetworkAvailable) => Some(AwaitingTransport),
            (AwaitingNetwork, NetworkUnavailable) => Some(AwaitingNetwork),

            (AwaitingTransport, TransportOpened) => Some(AwaitingSession),
            (AwaitingTransport, TransportFailed) => Some(AwaitingTransport),

            (AwaitingSession, HandshakeComplete) => Some(Established),
            (AwaitingSession, SessionRejected) => Some(AwaitingSession),
            (AwaitingSession, TransportNotConnected) => Some(AwaitingTransport),
            // Incomplete command-channel coverage is not a connection
            (AwaitingSession, SubscriptionFailed) => Some(AwaitingNetwork),

            (AwaitingTransport | AwaitingSession, NetworkUnavailable) => Some(AwaitingNetwork),

            (Established, SessionLost) => Some(AwaitingNetwork),

            _ => None,
        }
    }

    /// How long the network has been unavailable, if it currently is
    pub fn network_outage_ms(&self, now_ms: u64) -> Option<u64> {
        self.network_lost_since_ms
            .map(|since| now_ms.saturating_sub(since))
    }

    /// Check if the network outage has exceeded the reboot limit
    pub fn is_network_loss_unrecoverable(&self, now_ms: u64) -> bool {
        self.network_outage_ms(now_ms)
            .is_some_and(|outage| outage > self.network_loss_limit_ms)
    }
}
