//! Command handling for inbound platform messages
//!
//! This module handles:
//! - Classifying the inbound channel and decoding the JSON payload
//! - Dispatching to the management and device command handlers
//! - Reporting rejected and failed commands on the info channel

mod dispatcher;
pub mod handlers;

pub use dispatcher::{CommandDispatcher, CommandResult, DispatchOutcome};
