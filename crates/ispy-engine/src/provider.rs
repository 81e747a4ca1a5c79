//! Diagnostics provider abstraction.
//!
//! The orchestrator never produces scores itself; it asks a
//! `DiagnosticsProvider`. `MockProvider` stands in for the device backend
//! with random scores, `ScriptedProvider` replays pre-configured readings
//! and failures for deterministic tests. A real backend talking to the
//! device would implement the same trait.
//!
//! Device enumeration follows the same pattern through `DeviceSource`.

use crate::sim::{lock, make_rng, STREAM_DEVICES, STREAM_PROVIDER};
use async_trait::async_trait;
use ispy_shared::{Device, ModuleId};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Mock score range, `[30, 100)`
pub const MOCK_SCORE_MIN: f64 = 30.0;
pub const MOCK_SCORE_MAX: f64 = 100.0;

// ============================================================================
// Scan types
// ============================================================================

/// One module scan against one device
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub module_id: ModuleId,
    /// Catalog key ("battery", "storage", ...)
    pub module_key: String,
    pub device_id: Option<String>,
    /// How long the simulated work should take. Real backends ignore it.
    pub simulated_work: Duration,
}

/// Successful scan result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanReading {
    /// 0-100
    pub score: f64,
}

/// Backend failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("device disconnected")]
    DeviceDisconnected,

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Other(String),
}

/// Trait abstraction over diagnostic execution
#[async_trait]
pub trait DiagnosticsProvider: Send + Sync {
    /// Run one module scan and return its score
    async fn scan(&self, request: &ScanRequest) -> Result<ScanReading, ProviderError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

// ============================================================================
// Mock provider
// ============================================================================

/// Random scores after the simulated work elapses
pub struct MockProvider {
    rng: Mutex<StdRng>,
}

impl MockProvider {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Mutex::new(make_rng(seed, STREAM_PROVIDER)),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl DiagnosticsProvider for MockProvider {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanReading, ProviderError> {
        tokio::time::sleep(request.simulated_work).await;
        let score = lock(&self.rng).gen_range(MOCK_SCORE_MIN..MOCK_SCORE_MAX);
        Ok(ScanReading { score })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ============================================================================
// Scripted provider (testing)
// ============================================================================

/// One scripted answer
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Score(f64),
    Fail(ProviderError),
    /// Never answers; exercises the orchestrator timeout
    Hang,
}

/// Replays queued steps per module key, then falls back to a default score.
///
/// ```rust,ignore
/// let provider = ScriptedProvider::new(75.0)
///     .with_score("battery", 42.0)
///     .with_failure("network", ProviderError::DeviceDisconnected);
/// ```
pub struct ScriptedProvider {
    steps: Mutex<HashMap<String, VecDeque<ScriptedStep>>>,
    default_score: f64,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedProvider {
    pub fn new(default_score: f64) -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
            default_score,
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_step(self, key: &str, step: ScriptedStep) -> Self {
        lock(&self.steps)
            .entry(key.to_string())
            .or_default()
            .push_back(step);
        self
    }

    pub fn with_score(self, key: &str, score: f64) -> Self {
        self.with_step(key, ScriptedStep::Score(score))
    }

    pub fn with_failure(self, key: &str, error: ProviderError) -> Self {
        self.with_step(key, ScriptedStep::Fail(error))
    }

    /// Number of scans requested for a module key
    pub fn call_count(&self, key: &str) -> usize {
        lock(&self.calls).get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl DiagnosticsProvider for ScriptedProvider {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanReading, ProviderError> {
        *lock(&self.calls)
            .entry(request.module_key.clone())
            .or_insert(0) += 1;

        let step = lock(&self.steps)
            .get_mut(&request.module_key)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(ScriptedStep::Score(self.default_score));

        tokio::time::sleep(request.simulated_work).await;

        match step {
            ScriptedStep::Score(score) => Ok(ScanReading { score }),
            ScriptedStep::Fail(error) => Err(error),
            ScriptedStep::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ============================================================================
// Device source
// ============================================================================

/// Trait abstraction over device enumeration
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<Device>, ProviderError>;
}

/// Fixed part of a mock device
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub model: &'static str,
    pub os_version: &'static str,
    pub battery_cycles: u32,
    pub storage_total_gb: f64,
    pub connected: bool,
}

pub const MOCK_DEVICES: [DeviceProfile; 3] = [
    DeviceProfile {
        id: "00008130-0004A1B2C3D4E5F6",
        name: "Alex's iPhone 15 Pro",
        model: "iPhone16,1",
        os_version: "17.4.1",
        battery_cycles: 141,
        storage_total_gb: 256.0,
        connected: true,
    },
    DeviceProfile {
        id: "00008103-000C5E2F1A7B9D40",
        name: "Studio iPad Air",
        model: "iPad13,16",
        os_version: "17.3",
        battery_cycles: 613,
        storage_total_gb: 64.0,
        connected: true,
    },
    DeviceProfile {
        id: "00008101-0019384756AB12CD",
        name: "Test iPhone 12 mini",
        model: "iPhone13,1",
        os_version: "16.7.5",
        battery_cycles: 1087,
        storage_total_gb: 128.0,
        connected: false,
    },
];

/// Fixed identities with battery and storage use re-randomized per call
pub struct MockDeviceSource {
    profiles: Vec<DeviceProfile>,
    rng: Mutex<StdRng>,
}

impl MockDeviceSource {
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_profiles(MOCK_DEVICES.to_vec(), seed)
    }

    pub fn with_profiles(profiles: Vec<DeviceProfile>, seed: Option<u64>) -> Self {
        Self {
            profiles,
            rng: Mutex::new(make_rng(seed, STREAM_DEVICES)),
        }
    }
}

#[async_trait]
impl DeviceSource for MockDeviceSource {
    async fn enumerate(&self) -> Result<Vec<Device>, ProviderError> {
        let mut rng = lock(&self.rng);
        let devices = self
            .profiles
            .iter()
            .map(|p| {
                let used_fraction: f64 = rng.gen_range(0.30..0.95);
                Device {
                    id: p.id.to_string(),
                    name: p.name.to_string(),
                    model: p.model.to_string(),
                    os_version: p.os_version.to_string(),
                    battery_level: rng.gen_range(15..=100),
                    battery_cycle_count: p.battery_cycles,
                    storage_used_gb: (p.storage_total_gb * used_fraction * 10.0).round() / 10.0,
                    storage_total_gb: p.storage_total_gb,
                    connected: p.connected,
                }
            })
            .collect();
        Ok(devices)
    }
}
