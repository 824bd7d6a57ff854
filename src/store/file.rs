//! JSON file backed configuration store

use super::{ConfigDocument, ConfigError, ConfigStore};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Stores the configuration as one JSON object in a file.
///
/// Saves go through a sibling temporary file and a rename, so a power cut
/// leaves either the old or the new document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<ConfigDocument, ConfigError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at {}", self.path.display());
                return Ok(ConfigDocument::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice::<Value>(&raw)? {
            Value::Object(map) => Ok(ConfigDocument::new(map)),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    async fn save(&self, document: &ConfigDocument) -> Result<(), ConfigError> {
        let encoded = serde_json::to_vec_pretty(document)?;
        let temp = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&temp, &encoded)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConfigError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Cleared configuration at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
