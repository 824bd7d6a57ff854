//! Firmware download over HTTP
//!
//! The running build is sent in `x-firmware-version`; the server answers
//! `304 Not Modified` when it has nothing newer. The image is streamed to a
//! staging file next to the target and only renamed into place once the
//! whole body has arrived.

use super::{FirmwareOutcome, FirmwareUpdater};
use anyhow::{Context, Result};
use async_trait::async_trait;
use iotdm_shared::UpgradeRequest;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// Header carrying the running build to the update server
pub const VERSION_HEADER: &str = "x-firmware-version";

pub struct HttpFirmwareUpdater {
    client: reqwest::Client,
    image_path: PathBuf,
    current_version: String,
}

impl HttpFirmwareUpdater {
    pub fn new(image_path: impl Into<PathBuf>, current_version: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            image_path: image_path.into(),
            current_version: current_version.into(),
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.image_path.clone().into_os_string();
        staging.push(".staging");
        PathBuf::from(staging)
    }

    async fn download(&self, url: &str) -> Result<FirmwareOutcome> {
        let mut response = self
            .client
            .get(url)
            .header(VERSION_HEADER, &self.current_version)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        match response.status() {
            StatusCode::NOT_MODIFIED => return Ok(FirmwareOutcome::NoUpdateAvailable),
            status if !status.is_success() => {
                return Ok(FirmwareOutcome::Failed {
                    reason: format!("server answered {}", status),
                })
            }
            _ => {}
        }

        let expected = response.content_length();
        let staging = self.staging_path();
        let mut file = tokio::fs::File::create(&staging)
            .await
            .with_context(|| format!("cannot create {}", staging.display()))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.context("download interrupted")? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            match expected {
                Some(total) => debug!("Update progress: {} of {} bytes", written, total),
                None => debug!("Update progress: {} bytes", written),
            }
        }
        file.sync_all().await?;
        drop(file);

        if written == 0 {
            tokio::fs::remove_file(&staging).await.ok();
            return Ok(FirmwareOutcome::Failed {
                reason: "empty firmware image".into(),
            });
        }
        if let Some(total) = expected.filter(|total| *total != written) {
            tokio::fs::remove_file(&staging).await.ok();
            return Ok(FirmwareOutcome::Failed {
                reason: format!("short image: {} of {} bytes", written, total),
            });
        }

        tokio::fs::rename(&staging, &self.image_path)
            .await
            .with_context(|| format!("cannot install {}", self.image_path.display()))?;
        info!("Installed {} byte image at {}", written, self.image_path.display());
        Ok(FirmwareOutcome::Applied)
    }
}

#[async_trait]
impl FirmwareUpdater for HttpFirmwareUpdater {
    async fn fetch_and_apply(&mut self, request: &UpgradeRequest) -> FirmwareOutcome {
        let url = request.url();
        match self.download(&url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Firmware update from {} failed: {:#}", url, e);
                tokio::fs::remove_file(self.staging_path()).await.ok();
                FirmwareOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}
