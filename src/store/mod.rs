//! Persistent configuration storage

mod document;
mod file;
pub mod mask;

pub use document::ConfigDocument;
pub use file::JsonFileStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("device is not provisioned")]
    NotProvisioned,

    #[error("configuration is missing \"{0}\"")]
    MissingField(&'static str),

    #[error("configuration is not a JSON object")]
    NotAnObject,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage for the device configuration document
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored document; a missing document loads as empty
    async fn load(&self) -> Result<ConfigDocument, ConfigError>;

    /// Replace the stored document
    async fn save(&self, document: &ConfigDocument) -> Result<(), ConfigError>;

    /// Wipe the stored document
    async fn clear(&self) -> Result<(), ConfigError>;

    /// Copy of `snapshot` safe to publish
    fn mask_secrets(&self, snapshot: &Map<String, Value>) -> Map<String, Value> {
        mask::mask_secrets(snapshot)
    }
}
