//! JSON codec for control-plane payloads
//!
//! Every payload exchanged with the platform is a single JSON object:
//! ```text
//! { "d": { ... } }        inbound commands, registration, status
//! { "info": { ... } }     diagnostics
//! ```

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum payload size accepted from the platform
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {max})", max = MAX_MESSAGE_SIZE)]
    MessageTooLarge(usize),

    #[error("Empty payload")]
    Empty,

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a payload into a JSON object
pub fn decode(payload: &[u8]) -> Result<Map<String, Value>, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(payload.len()));
    }

    match serde_json::from_slice::<Value>(payload)? {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::NotAnObject),
    }
}

/// Encode a value into payload bytes
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, CodecError> {
    let encoded = serde_json::to_vec(value)?;

    if encoded.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(encoded.len()));
    }

    Ok(Bytes::from(encoded))
}
