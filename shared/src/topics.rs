//! Control-plane topic namespace
//!
//! Direct-mode topics are fixed by the platform. A gateway-managed device
//! is addressed as a sub-resource of the gateway, so every topic gets a
//! `/type/<devType>/id/<devId>` segment after its first path component:
//! ```text
//! iotdm-1/device/update  ->  iotdm-1/type/Valve/id/valve-01/device/update
//! ```

use crate::identity::{DeviceIdentity, OperatingMode};

/// Direct-mode topic templates
pub mod templates {
    pub const STATUS: &str = "iot-2/evt/status/fmt/json";
    pub const INFO: &str = "iot-2/evt/info/fmt/json";
    pub const COMMAND: &str = "iot-2/cmd/+/fmt/+";
    pub const COMMAND_BASE: &str = "iot-2/cmd/";
    pub const RESPONSE: &str = "iotdm-1/response";
    pub const MANAGE: &str = "iotdevice-1/mgmt/manage";
    pub const UPDATE: &str = "iotdm-1/device/update";
    pub const REBOOT: &str = "iotdm-1/mgmt/initiate/device/reboot";
    pub const FACTORY_RESET: &str = "iotdm-1/mgmt/initiate/device/factory_reset";
}

/// Kind of an inbound channel, as far as the dispatcher cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    ManagementResponse,
    RebootRequest,
    FactoryResetRequest,
    UpdateNotify,
    Command,
}

/// The nine channel names used by one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub status: String,
    pub info: String,
    pub command: String,
    pub command_base: String,
    pub response: String,
    pub manage: String,
    pub update: String,
    pub reboot: String,
    pub factory_reset: String,
}

impl TopicSet {
    /// Derive the topic set for an identity in the given mode
    pub fn build(identity: &DeviceIdentity, mode: OperatingMode) -> Self {
        let direct = Self::direct();
        match mode {
            OperatingMode::Direct => direct,
            OperatingMode::GatewayManaged => {
                let t = |topic: &str| {
                    to_gateway_topic(topic, &identity.device_type, &identity.device_id)
                };
                Self {
                    status: t(&direct.status),
                    info: t(&direct.info),
                    command: t(&direct.command),
                    command_base: t(&direct.command_base),
                    response: t(&direct.response),
                    manage: t(&direct.manage),
                    update: t(&direct.update),
                    reboot: t(&direct.reboot),
                    factory_reset: t(&direct.factory_reset),
                }
            }
        }
    }

    /// The platform-fixed direct-mode topics
    pub fn direct() -> Self {
        Self {
            status: templates::STATUS.into(),
            info: templates::INFO.into(),
            command: templates::COMMAND.into(),
            command_base: templates::COMMAND_BASE.into(),
            response: templates::RESPONSE.into(),
            manage: templates::MANAGE.into(),
            update: templates::UPDATE.into(),
            reboot: templates::REBOOT.into(),
            factory_reset: templates::FACTORY_RESET.into(),
        }
    }

    /// Channels subscribed during the management handshake, in order
    pub fn handshake_subscriptions(&self) -> [&str; 5] {
        [
            &self.response,
            &self.reboot,
            &self.factory_reset,
            &self.update,
            &self.command,
        ]
    }

    /// Classify an inbound channel name
    pub fn classify(&self, channel: &str) -> Option<ChannelKind> {
        if channel == self.response {
            Some(ChannelKind::ManagementResponse)
        } else if channel == self.reboot {
            Some(ChannelKind::RebootRequest)
        } else if channel == self.factory_reset {
            Some(ChannelKind::FactoryResetRequest)
        } else if channel == self.update {
            Some(ChannelKind::UpdateNotify)
        } else if channel.starts_with(&self.command_base) {
            Some(ChannelKind::Command)
        } else {
            None
        }
    }
}

/// Insert the gateway sub-resource segment after the first path component
pub fn to_gateway_topic(topic: &str, device_type: &str, device_id: &str) -> String {
    let segment = format!("/type/{}/id/{}", device_type, device_id);
    match topic.find('/') {
        Some(pos) => format!("{}{}{}", &topic[..pos], segment, &topic[pos..]),
        None => format!("{}{}", topic, segment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(org: &str) -> DeviceIdentity {
        DeviceIdentity::new(org, "Valve", "valve-01", Some("tok".into()))
    }

    fn all(topics: &TopicSet) -> [&str; 9] {
        [
            &topics.status,
            &topics.info,
            &topics.command,
            &topics.command_base,
            &topics.response,
            &topics.manage,
            &topics.update,
            &topics.reboot,
            &topics.factory_reset,
        ]
    }

    #[test]
    fn test_direct_topics_are_templates() {
        let id = identity("abc123");
        let topics = TopicSet::build(&id, id.mode());
        assert_eq!(topics, TopicSet::direct());
        assert_eq!(topics.manage, "iotdevice-1/mgmt/manage");
        assert_eq!(topics.command_base, "iot-2/cmd/");
    }

    #[test]
    fn test_gateway_topic_insertion() {
        let id = identity("gw.local");
        let topics = TopicSet::build(&id, id.mode());
        assert_eq!(topics.status, "iot-2/type/Valve/id/valve-01/evt/status/fmt/json");
        assert_eq!(topics.command_base, "iot-2/type/Valve/id/valve-01/cmd/");
        assert_eq!(topics.response, "iotdm-1/type/Valve/id/valve-01/response");
        assert_eq!(
            topics.factory_reset,
            "iotdm-1/type/Valve/id/valve-01/mgmt/initiate/device/factory_reset"
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        for org in ["abc123", "gw.local"] {
            let id = identity(org);
            let first = TopicSet::build(&id, id.mode());
            let second = TopicSet::build(&id, id.mode());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_stripping_gateway_segment_yields_direct_topic() {
        let id = identity("gw.local");
        let gateway = TopicSet::build(&id, OperatingMode::GatewayManaged);
        let direct = TopicSet::direct();
        let segment = "/type/Valve/id/valve-01";

        for (gw, d) in all(&gateway).iter().zip(all(&direct).iter()) {
            assert_eq!(gw.replacen(segment, "", 1), *d);
        }
    }

    #[test]
    fn test_classify_channels() {
        let id = identity("gw.local");
        let topics = TopicSet::build(&id, id.mode());

        assert_eq!(
            topics.classify("iotdm-1/type/Valve/id/valve-01/response"),
            Some(ChannelKind::ManagementResponse)
        );
        assert_eq!(
            topics.classify(&topics.reboot),
            Some(ChannelKind::RebootRequest)
        );
        assert_eq!(
            topics.classify(&topics.factory_reset),
            Some(ChannelKind::FactoryResetRequest)
        );
        assert_eq!(topics.classify(&topics.update), Some(ChannelKind::UpdateNotify));
        assert_eq!(
            topics.classify("iot-2/type/Valve/id/valve-01/cmd/valve/fmt/json"),
            Some(ChannelKind::Command)
        );
        // Another device's commands must not match
        assert_eq!(topics.classify("iot-2/type/Valve/id/valve-02/cmd/x/fmt/json"), None);
        assert_eq!(topics.classify("something/else"), None);
    }

    #[test]
    fn test_handshake_order() {
        let topics = TopicSet::direct();
        assert_eq!(
            topics.handshake_subscriptions(),
            [
                "iotdm-1/response",
                "iotdm-1/mgmt/initiate/device/reboot",
                "iotdm-1/mgmt/initiate/device/factory_reset",
                "iotdm-1/device/update",
                "iot-2/cmd/+/fmt/+",
            ]
        );
    }
}
