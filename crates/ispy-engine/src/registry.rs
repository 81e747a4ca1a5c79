//! Device registry.
//!
//! Holds the device list from a `DeviceSource`, replaced wholesale on each
//! refresh. The selected device is kept by id and resolved on every read.

use crate::events::EventBus;
use crate::provider::{DeviceSource, MockDeviceSource};
use chrono::{DateTime, Utc};
use ispy_shared::config::IspyConfig;
use ispy_shared::{Device, IspyError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Refreshed { count: usize },
    RefreshFailed { reason: String },
    SelectionChanged { id: Option<String> },
}

#[derive(Debug, Default)]
struct RegistryState {
    devices: Vec<Device>,
    selected: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl RegistryState {
    fn contains(&self, id: &str) -> bool {
        self.devices.iter().any(|d| d.id == id)
    }
}

/// Owned handle over the device list
#[derive(Clone)]
pub struct DeviceRegistry {
    state: Arc<RwLock<RegistryState>>,
    source: Arc<dyn DeviceSource>,
    interval: Duration,
    events: EventBus<RegistryEvent>,
}

impl DeviceRegistry {
    pub fn new(config: &IspyConfig, source: Arc<dyn DeviceSource>) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            source,
            interval: config.timing.refresh_interval(),
            events: EventBus::new(),
        }
    }

    pub fn with_mock(config: &IspyConfig) -> Self {
        Self::new(config, Arc::new(MockDeviceSource::new(config.seed)))
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Replace the device list from the source.
    ///
    /// Selects the first device when nothing is selected, or when the
    /// selected id is no longer listed. On source failure the previous
    /// list is kept.
    pub async fn refresh(&self) -> Result<usize> {
        let devices = match self.source.enumerate().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device refresh failed: {}", e);
                self.events.emit(RegistryEvent::RefreshFailed {
                    reason: e.to_string(),
                });
                return Err(IspyError::Provider(e.to_string()));
            }
        };

        let mut state = self.state.write().await;
        state.devices = devices;
        state.refreshed_at = Some(Utc::now());

        let dangling = state
            .selected
            .as_deref()
            .is_some_and(|id| !state.contains(id));
        if state.selected.is_none() || dangling {
            let first = state.devices.first().map(|d| d.id.clone());
            if first != state.selected {
                state.selected = first.clone();
                self.events
                    .emit(RegistryEvent::SelectionChanged { id: first });
            }
        }

        let count = state.devices.len();
        debug!("Device list refreshed: {} devices", count);
        self.events.emit(RegistryEvent::Refreshed { count });
        Ok(count)
    }

    /// Refresh immediately, then every refresh interval until the handle is
    /// aborted.
    pub fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Failures are logged in refresh; the next tick retries
                let _ = this.refresh().await;
            }
        })
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.state.read().await.devices.clone()
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.refreshed_at
    }

    pub async fn selected_device(&self) -> Option<Device> {
        let state = self.state.read().await;
        let id = state.selected.as_deref()?;
        state.devices.iter().find(|d| d.id == id).cloned()
    }

    pub async fn select_device(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.contains(id) {
            return Err(IspyError::UnknownDevice(id.to_string()));
        }
        state.selected = Some(id.to_string());
        self.events.emit(RegistryEvent::SelectionChanged {
            id: Some(id.to_string()),
        });
        Ok(())
    }

    /// Select the unique device whose id starts with `prefix`
    pub async fn select_by_prefix(&self, prefix: &str) -> Result<Device> {
        let matches: Vec<Device> = {
            let state = self.state.read().await;
            state
                .devices
                .iter()
                .filter(|d| d.id.starts_with(prefix))
                .cloned()
                .collect()
        };
        match matches.as_slice() {
            [device] => {
                self.select_device(&device.id).await?;
                Ok(device.clone())
            }
            [] => Err(IspyError::UnknownDevice(prefix.to_string())),
            _ => Err(IspyError::UnknownDevice(format!(
                "{} (ambiguous, {} matches)",
                prefix,
                matches.len()
            ))),
        }
    }
}
