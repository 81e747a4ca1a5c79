//! Session wiring: config, device registry, orchestrator and assistant.

use crate::cli::Cli;
use anyhow::{Context, Result};
use ispy_engine::{ChatAssistant, DeviceRegistry, DiagnosticsOrchestrator};
use ispy_shared::{Device, IspyConfig};
use tracing::{debug, info};

/// Load the config named on the command line (or discovered), with the
/// `--seed` flag taking precedence over the file.
pub fn load_config(cli: &Cli) -> Result<IspyConfig> {
    let mut config = IspyConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load config".to_string(),
    })?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    Ok(config)
}

/// State holders for one CLI invocation
pub struct Session {
    pub config: IspyConfig,
    pub registry: DeviceRegistry,
    pub orchestrator: DiagnosticsOrchestrator,
    pub assistant: ChatAssistant,
}

impl Session {
    /// Build the mock-backed holders, refresh devices and apply the
    /// `--device` prefix.
    pub async fn start(config: IspyConfig, device_prefix: Option<&str>) -> Result<Self> {
        let registry = DeviceRegistry::with_mock(&config);
        let count = registry.refresh().await.context("Failed to list devices")?;
        debug!("Session found {} devices", count);

        if let Some(prefix) = device_prefix {
            let device = registry
                .select_by_prefix(prefix)
                .await
                .with_context(|| format!("No single device matches '{}'", prefix))?;
            info!("Selected device {}", device.name);
        }

        let orchestrator = DiagnosticsOrchestrator::with_mock(&config);
        let selected = registry.selected_device().await;
        orchestrator.set_device(selected.map(|d| d.id)).await;

        let assistant = ChatAssistant::new(&config);

        Ok(Self {
            config,
            registry,
            orchestrator,
            assistant,
        })
    }

    pub async fn selected_device(&self) -> Option<Device> {
        self.registry.selected_device().await
    }

    /// Selected device, or an error naming the fix
    pub async fn require_device(&self) -> Result<Device> {
        self.selected_device()
            .await
            .context("No device selected (use --device <prefix>)")
    }
}
