//! Device runtime context

use crate::diagnostics::DiagnosticsPublisher;
use crate::store::{ConfigDocument, ConfigError};
use iotdm_shared::{
    DeviceIdentity, Endpoint, Metadata, OperatingMode, SessionCredentials, TopicSet,
};
use std::time::Duration;

/// Build identifier reported in status and configuration snapshots
pub const BUILD_ID: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Everything the device derived from its configuration at startup, plus
/// the metadata that the platform may replace while running
pub struct DeviceContext {
    pub identity: DeviceIdentity,
    pub mode: OperatingMode,
    pub endpoint: Endpoint,
    pub credentials: SessionCredentials,
    pub topics: TopicSet,
    pub diagnostics: DiagnosticsPublisher,
    /// Last loaded or saved configuration document
    pub config: ConfigDocument,
    pub metadata: Metadata,
    pub publish_interval: Option<Duration>,
}

impl DeviceContext {
    /// Build the context from a provisioned configuration document
    pub fn from_config(config: ConfigDocument) -> Result<Self, ConfigError> {
        if !config.is_provisioned() {
            return Err(ConfigError::NotProvisioned);
        }
        let identity = config.identity()?;
        let mode = identity.mode();
        let topics = TopicSet::build(&identity, mode);
        let metadata = config.metadata();

        Ok(Self {
            endpoint: identity.endpoint(),
            credentials: identity.credentials(),
            diagnostics: DiagnosticsPublisher::new(topics.info.clone()),
            publish_interval: metadata.publish_interval(),
            identity,
            mode,
            topics,
            config,
            metadata,
        })
    }

    /// Replace the metadata, keeping the configuration document and the
    /// publish interval in step with it
    pub fn replace_metadata(&mut self, metadata: Metadata) {
        self.config.set_metadata(&metadata);
        self.publish_interval = metadata.publish_interval();
        self.metadata = metadata;
    }
}
