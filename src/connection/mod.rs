//! Connection management for the platform session
//!
//! This module handles:
//! - Network supervision with rejoin and the long-outage reboot
//! - Socket and session setup with a fixed retry delay
//! - The management handshake gate before the session counts as established
//! - Detecting a dropped session and starting over

mod manager;

pub use manager::{ConnectionConfig, ConnectionManager, ServiceOutcome};
