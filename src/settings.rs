//! Process settings from the environment

use crate::connection::ConnectionConfig;
use crate::transport::MqttTransportConfig;
use std::path::PathBuf;

/// Environment variable names
pub mod vars {
    pub const CONFIG: &str = "IOTDM_CONFIG";
    pub const FIRMWARE_IMAGE: &str = "IOTDM_FIRMWARE_IMAGE";
    pub const RESET_SIGNAL: &str = "IOTDM_RESET_SIGNAL";
    pub const REBOOT_COMMAND: &str = "IOTDM_REBOOT_COMMAND";
    pub const NETWORK_PROBE: &str = "IOTDM_NETWORK_PROBE";
    pub const REJOIN_COMMAND: &str = "IOTDM_REJOIN_COMMAND";
    pub const BROKER_CA: &str = "IOTDM_BROKER_CA";
}

/// Paths, host commands and timing for one device process
#[derive(Debug, Clone)]
pub struct Settings {
    /// Persisted configuration document
    pub config_path: PathBuf,
    /// Where downloaded firmware images are installed
    pub firmware_image_path: PathBuf,
    /// Reset signal value file; active low
    pub reset_signal_path: Option<PathBuf>,
    pub reboot_command: Vec<String>,
    /// `host:port` resolved to check connectivity; defaults to the broker
    pub network_probe: Option<String>,
    pub rejoin_command: Vec<String>,
    pub connection: ConnectionConfig,
    pub mqtt: MqttTransportConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/iotdm/config.json"),
            firmware_image_path: PathBuf::from("/var/lib/iotdm/firmware.bin"),
            reset_signal_path: None,
            reboot_command: vec!["systemctl".into(), "reboot".into()],
            network_probe: None,
            rejoin_command: Vec::new(),
            connection: ConnectionConfig::default(),
            mqtt: MqttTransportConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; empty values count
    /// as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(path) = get(vars::CONFIG) {
            settings.config_path = path.into();
        }
        if let Some(path) = get(vars::FIRMWARE_IMAGE) {
            settings.firmware_image_path = path.into();
        }
        if let Some(path) = get(vars::RESET_SIGNAL) {
            settings.reset_signal_path = Some(path.into());
        }
        if let Some(command) = get(vars::REBOOT_COMMAND) {
            settings.reboot_command = split_command(&command);
        }
        if let Some(probe) = get(vars::NETWORK_PROBE) {
            settings.network_probe = Some(probe);
        }
        if let Some(command) = get(vars::REJOIN_COMMAND) {
            settings.rejoin_command = split_command(&command);
        }
        if let Some(path) = get(vars::BROKER_CA) {
            settings.mqtt.ca_path = Some(path.into());
        }
        settings
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}
