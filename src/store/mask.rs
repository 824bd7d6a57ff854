//! Secret masking for configuration snapshots

use serde_json::{Map, Value};

/// Replacement text for masked values
pub const MASK: &str = "********";

/// Keys that always hold secrets
const SECRET_KEYS: &[&str] = &["token", "w_pw"];

/// Fragments that mark a key as secret wherever they appear
const SECRET_FRAGMENTS: &[&str] = &["password", "passwd", "secret"];

pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_KEYS.contains(&key.as_str())
        || SECRET_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Copy of `snapshot` with every secret value replaced by [`MASK`].
///
/// Objects nested in objects or arrays are masked too; empty secrets stay
/// empty so an operator can still tell whether one was provisioned.
pub fn mask_secrets(snapshot: &Map<String, Value>) -> Map<String, Value> {
    snapshot
        .iter()
        .map(|(key, value)| (key.clone(), mask_value(is_secret_key(key), value)))
        .collect()
}

fn mask_value(secret: bool, value: &Value) -> Value {
    match value {
        Value::Object(nested) => Value::Object(mask_secrets(nested)),
        Value::String(s) if s.is_empty() => value.clone(),
        Value::Null => Value::Null,
        Value::Array(items) if !secret => Value::Array(
            items.iter().map(|item| mask_value(false, item)).collect(),
        ),
        _ if secret => Value::String(MASK.into()),
        _ => value.clone(),
    }
}
