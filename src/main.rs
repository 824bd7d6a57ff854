mod application;
mod command;
mod connection;
mod context;
mod diagnostics;
mod firmware;
mod platform;
mod runtime;
mod session;
mod settings;
mod store;
mod transport;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use application::DefaultApplication;
use context::{DeviceContext, BUILD_ID};
use firmware::HttpFirmwareUpdater;
use platform::SystemPlatform;
use runtime::{Collaborators, DeviceRuntime};
use settings::Settings;
use store::{ConfigStore, JsonFileStore};
use transport::{MqttTransport, ProbeNetwork};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let settings = Settings::from_env();
    info!("Device-management client starting: {}", BUILD_ID);
    info!("  Config: {}", settings.config_path.display());

    let store = JsonFileStore::new(&settings.config_path);
    let config = store
        .load()
        .await
        .with_context(|| format!("loading {}", settings.config_path.display()))?;
    let device = DeviceContext::from_config(config)
        .with_context(|| format!("using {}", settings.config_path.display()))?;

    info!(
        "  Device: {}/{} ({})",
        device.identity.device_type, device.identity.device_id, device.mode
    );
    info!("  Broker: {}", device.endpoint);

    let probe = settings
        .network_probe
        .clone()
        .unwrap_or_else(|| format!("{}:{}", device.endpoint.host, device.endpoint.port));

    let links = Collaborators {
        transport: Box::new(MqttTransport::new(settings.mqtt.clone())),
        network: Box::new(ProbeNetwork::new(probe, settings.rejoin_command.clone())),
        platform: Box::new(SystemPlatform::new(
            settings.reset_signal_path.clone(),
            settings.reboot_command.clone(),
        )),
        store: Box::new(store),
        firmware: Box::new(HttpFirmwareUpdater::new(
            &settings.firmware_image_path,
            BUILD_ID,
        )?),
        application: Box::new(DefaultApplication),
    };

    let reason = DeviceRuntime::new(device, settings.connection.clone(), links)
        .run()
        .await?;
    info!("Exiting for reboot: {}", reason);
    Ok(())
}
