//! The persisted configuration document

use super::ConfigError;
use iotdm_shared::{DeviceIdentity, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys of the configuration document
pub mod keys {
    pub const ORG: &str = "org";
    pub const DEVICE_TYPE: &str = "devType";
    pub const DEVICE_ID: &str = "devId";
    pub const TOKEN: &str = "token";
    pub const META: &str = "meta";
    /// Provisioning marker
    pub const CONFIG: &str = "config";
}

/// Value of the `config` key once the device has been provisioned
pub const PROVISIONED_MARKER: &str = "done";

/// Flat JSON configuration, kept in key order so snapshots read the same
/// way the provisioning tool wrote them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument(Map<String, Value>);

impl ConfigDocument {
    pub fn new(entries: Map<String, Value>) -> Self {
        Self(entries)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_provisioned(&self) -> bool {
        self.0.get(keys::CONFIG).and_then(Value::as_str) == Some(PROVISIONED_MARKER)
    }

    /// Device identity from the provisioned fields
    pub fn identity(&self) -> Result<DeviceIdentity, ConfigError> {
        Ok(DeviceIdentity::new(
            self.required(keys::ORG)?,
            self.required(keys::DEVICE_TYPE)?,
            self.required(keys::DEVICE_ID)?,
            self.text(keys::TOKEN).map(str::to_string),
        ))
    }

    /// Metadata section; absent or non-object counts as empty
    pub fn metadata(&self) -> Metadata {
        match self.0.get(keys::META) {
            Some(Value::Object(map)) => Metadata::new(map.clone()),
            _ => Metadata::default(),
        }
    }

    pub fn set_metadata(&mut self, metadata: &Metadata) {
        self.0
            .insert(keys::META.into(), Value::Object(metadata.as_map().clone()));
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.text(key).ok_or(ConfigError::MissingField(key))
    }
}

impl From<Map<String, Value>> for ConfigDocument {
    fn from(entries: Map<String, Value>) -> Self {
        Self(entries)
    }
}
