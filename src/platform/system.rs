//! Linux host platform

use super::{Platform, RebootReason};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Platform backed by a GPIO-style value file and a reboot command
pub struct SystemPlatform {
    /// File holding the reset line level; the line is active low
    reset_signal: Option<PathBuf>,
    reboot_command: Vec<String>,
}

impl SystemPlatform {
    pub fn new(reset_signal: Option<PathBuf>, reboot_command: Vec<String>) -> Self {
        Self {
            reset_signal,
            reboot_command,
        }
    }
}

#[async_trait]
impl Platform for SystemPlatform {
    async fn reset_requested(&self) -> bool {
        let Some(path) = &self.reset_signal else {
            return false;
        };
        match tokio::fs::read_to_string(path).await {
            Ok(level) => level.trim() == "0",
            Err(e) => {
                debug!("Cannot read reset signal {}: {}", path.display(), e);
                false
            }
        }
    }

    async fn reboot(&self, reason: RebootReason) -> Result<()> {
        let Some((program, args)) = self.reboot_command.split_first() else {
            bail!("no reboot command configured");
        };

        info!("Rebooting ({}): {}", reason, self.reboot_command.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .with_context(|| format!("failed to run {}", program))?;

        if !status.success() {
            warn!("Reboot command exited with {}", status);
            bail!("reboot command exited with {}", status);
        }
        Ok(())
    }
}
