//! Device identity and broker addressing
//!
//! The organization field doubles as the broker selector: a plain
//! organization id means the hosted platform endpoint, while anything
//! containing a `.` is taken as the host name of a gateway's own broker.

use std::fmt;

/// Domain appended to the organization id in direct mode
pub const HOSTED_BROKER_DOMAIN: &str = "messaging.internetofthings.ibmcloud.com";

/// TLS port used for the hosted platform
pub const SECURE_PORT: u16 = 8883;

/// Plain port used for gateway brokers
pub const PLAIN_PORT: u16 = 1883;

/// Username the hosted platform expects for token authentication
pub const TOKEN_AUTH_USER: &str = "use-token-auth";

/// How the device reaches the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Straight to the hosted multi-tenant endpoint
    Direct,
    /// As a managed sub-resource of a gateway, via a custom broker
    GatewayManaged,
}

impl OperatingMode {
    /// Derive the mode from the organization identifier
    pub fn for_org(org: &str) -> Self {
        if org.contains('.') {
            OperatingMode::GatewayManaged
        } else {
            OperatingMode::Direct
        }
    }

    pub fn port(self) -> u16 {
        match self {
            OperatingMode::Direct => SECURE_PORT,
            OperatingMode::GatewayManaged => PLAIN_PORT,
        }
    }

    pub fn uses_tls(self) -> bool {
        matches!(self, OperatingMode::Direct)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Direct => write!(f, "direct"),
            OperatingMode::GatewayManaged => write!(f, "gateway-managed"),
        }
    }
}

/// Identity of this device, loaded once from persisted configuration
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub org: String,
    pub device_type: String,
    pub device_id: String,
    pub token: Option<String>,
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("org", &self.org)
            .field("device_type", &self.device_type)
            .field("device_id", &self.device_id)
            .field("token", &self.token.as_ref().map(|_| "********"))
            .finish()
    }
}

impl DeviceIdentity {
    pub fn new(
        org: impl Into<String>,
        device_type: impl Into<String>,
        device_id: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            org: org.into(),
            device_type: device_type.into(),
            device_id: device_id.into(),
            token,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        OperatingMode::for_org(&self.org)
    }

    /// Broker address for this identity
    pub fn endpoint(&self) -> Endpoint {
        let mode = self.mode();
        let host = match mode {
            OperatingMode::Direct => format!("{}.{}", self.org, HOSTED_BROKER_DOMAIN),
            OperatingMode::GatewayManaged => self.org.clone(),
        };
        Endpoint {
            host,
            port: mode.port(),
            tls: mode.uses_tls(),
        }
    }

    /// Session credentials presented during the pub/sub handshake
    pub fn credentials(&self) -> SessionCredentials {
        match self.mode() {
            OperatingMode::Direct => SessionCredentials {
                client_id: format!("d:{}:{}:{}", self.org, self.device_type, self.device_id),
                username: self.token.as_ref().map(|_| TOKEN_AUTH_USER.to_string()),
                password: self.token.clone(),
            },
            OperatingMode::GatewayManaged => SessionCredentials {
                client_id: format!("d:{}:{}", self.device_type, self.device_id),
                username: None,
                password: None,
            },
        }
    }
}

/// Host and port of the platform broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Client id and optional username/password for the session handshake
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}
