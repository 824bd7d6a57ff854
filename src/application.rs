//! Hooks for device-specific behaviour on top of device management

use crate::context::BUILD_ID;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// What an application adds to the device loop.
///
/// Every method has a default, so an application overrides only what it
/// uses. With the defaults the device handles platform commands alone and
/// reports uptime and build as its status.
pub trait DeviceApplication: Send {
    /// Called with the decoded body of every message on the device command
    /// channel, after the built-in commands in it were handled
    fn handle_command(&mut self, _command: &Map<String, Value>) {}

    /// Body of the periodic status event
    fn status(&self, uptime: Duration) -> Value {
        json!({
            "d": {
                "uptime": uptime.as_secs(),
                "build": BUILD_ID,
            }
        })
    }
}

/// Application without behaviour of its own
#[derive(Debug, Default)]
pub struct DefaultApplication;

impl DeviceApplication for DefaultApplication {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_body() {
        let status = DefaultApplication.status(Duration::from_millis(65_500));
        assert_eq!(status, json!({"d": {"uptime": 65, "build": BUILD_ID}}));
    }
}
