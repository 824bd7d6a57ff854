//! Typed command payloads
//!
//! The platform wraps every command body in a `d` object. Each command kind
//! is decoded into its own structure here so that a missing or mistyped
//! field surfaces as a `CommandError` instead of a silent default.

use crate::Metadata;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field name the platform uses for the metadata update
pub const METADATA_FIELD: &str = "metadata";

/// Validation errors for inbound command payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("payload has no \"d\" object")]
    MissingData,

    #[error("missing field \"{0}\"")]
    MissingField(&'static str),

    #[error("invalid field \"{field}\": {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Firmware source extracted from an upgrade command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl UpgradeRequest {
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Commands recognized on the device command channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    Upgrade(UpgradeRequest),
    Config,
}

/// One entry of a device-update `fields` list
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Metadata(Metadata),
    /// Field the device does not manage; ignored
    Unsupported(String),
}

#[derive(Deserialize)]
struct UpdateBody {
    fields: Vec<FieldEntry>,
}

#[derive(Deserialize)]
struct FieldEntry {
    field: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct UpgradeFields {
    server: Option<String>,
    port: Option<PortField>,
    uri: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortField {
    Number(u64),
    Text(String),
}

/// The `d` object of a payload, if present
pub fn data(payload: &Map<String, Value>) -> Option<&Map<String, Value>> {
    payload.get("d").and_then(Value::as_object)
}

/// Decode a device-command payload.
///
/// Returns `Ok(None)` for payloads that carry neither `upgrade` nor
/// `config`. `upgrade` takes precedence when both are present.
pub fn parse_device_command(
    payload: &Map<String, Value>,
) -> Result<Option<DeviceCommand>, CommandError> {
    let Some(d) = data(payload) else {
        return Ok(None);
    };

    if let Some(upgrade) = d.get("upgrade") {
        return parse_upgrade(upgrade).map(|req| Some(DeviceCommand::Upgrade(req)));
    }

    if d.contains_key("config") {
        return Ok(Some(DeviceCommand::Config));
    }

    Ok(None)
}

fn parse_upgrade(value: &Value) -> Result<UpgradeRequest, CommandError> {
    let fields: UpgradeFields =
        serde_json::from_value(value.clone()).map_err(|e| CommandError::InvalidField {
            field: "upgrade",
            reason: e.to_string(),
        })?;

    let host = fields
        .server
        .filter(|s| !s.trim().is_empty())
        .ok_or(CommandError::MissingField("server"))?;
    let port = fields.port.ok_or(CommandError::MissingField("port"))?;
    let path = fields.uri.ok_or(CommandError::MissingField("uri"))?;

    let port = match port {
        PortField::Number(n) => u16::try_from(n).ok(),
        PortField::Text(s) => s.trim().parse::<u16>().ok(),
    }
    .filter(|p| *p != 0)
    .ok_or_else(|| CommandError::InvalidField {
        field: "port",
        reason: "not a TCP port".into(),
    })?;

    Ok(UpgradeRequest { host, port, path })
}

/// Decode a device-update payload into the list of field changes.
///
/// The whole update is rejected if any entry is malformed, so a partially
/// valid update never touches stored metadata.
pub fn parse_update_fields(payload: &Map<String, Value>) -> Result<Vec<FieldChange>, CommandError> {
    let d = data(payload).ok_or(CommandError::MissingData)?;
    let body: UpdateBody = serde_json::from_value(Value::Object(d.clone()))
        .map_err(|e| CommandError::Malformed(e.to_string()))?;

    body.fields
        .into_iter()
        .map(|entry| {
            if entry.field != METADATA_FIELD {
                return Ok(FieldChange::Unsupported(entry.field));
            }
            match entry.value {
                Value::Object(map) => Ok(FieldChange::Metadata(Metadata::new(map))),
                _ => Err(CommandError::InvalidField {
                    field: "value",
                    reason: "metadata must be an object".into(),
                }),
            }
        })
        .collect()
}
