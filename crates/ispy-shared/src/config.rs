//! iSpy configuration.
//!
//! Lives in `~/.config/ispy/config.toml`. Every field has a default, so an
//! empty or missing file yields the stock simulation timings.
//!
//! Simulated delays are written in "time units"; `timing.time_unit_ms`
//! says how long one unit lasts in wall-clock time.

use crate::activity::DEFAULT_ACTIVITY_CAPACITY;
use crate::error::{IspyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "ISPY_CONFIG";
const ANALYTICS_DIR: &str = "analytics";

/// Half-open range of time units, `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitRange {
    pub min: f64,
    pub max: f64,
}

impl UnitRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.min >= 0.0 && self.min < self.max) {
            return Err(IspyError::Config(format!(
                "{}: expected 0 <= min < max, got [{}, {})",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Simulation timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wall-clock length of one time unit in milliseconds
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,

    /// Delay between consecutive module starts in a batch
    #[serde(default = "default_stagger")]
    pub stagger_units: f64,

    /// Simulated work per module in a batch
    #[serde(default = "default_batch_work")]
    pub batch_work_units: UnitRange,

    /// Simulated work for a single-module run
    #[serde(default = "default_single_run")]
    pub single_run_units: f64,

    /// Assistant "thinking" latency
    #[serde(default = "default_reply_latency")]
    pub reply_latency_units: UnitRange,

    /// Device list refresh period
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_units: f64,

    /// Upper bound on a single provider call
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_units: f64,
}

fn default_time_unit_ms() -> u64 {
    1000
}

fn default_stagger() -> f64 {
    0.5
}

fn default_batch_work() -> UnitRange {
    UnitRange::new(2.0, 3.0)
}

fn default_single_run() -> f64 {
    3.0
}

fn default_reply_latency() -> UnitRange {
    UnitRange::new(1.5, 3.0)
}

fn default_refresh_interval() -> f64 {
    5.0
}

fn default_scan_timeout() -> f64 {
    30.0
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: default_time_unit_ms(),
            stagger_units: default_stagger(),
            batch_work_units: default_batch_work(),
            single_run_units: default_single_run(),
            reply_latency_units: default_reply_latency(),
            refresh_interval_units: default_refresh_interval(),
            scan_timeout_units: default_scan_timeout(),
        }
    }
}

impl TimingConfig {
    /// Convert time units to a wall-clock duration
    pub fn duration(&self, units: f64) -> Duration {
        let units = if units.is_finite() { units.max(0.0) } else { 0.0 };
        Duration::from_secs_f64(units * self.time_unit_ms as f64 / 1000.0)
    }

    pub fn stagger(&self) -> Duration {
        self.duration(self.stagger_units)
    }

    pub fn single_run(&self) -> Duration {
        self.duration(self.single_run_units)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.duration(self.refresh_interval_units)
    }

    pub fn scan_timeout(&self) -> Duration {
        self.duration(self.scan_timeout_units)
    }

    fn validate(&self) -> Result<()> {
        if self.time_unit_ms == 0 {
            return Err(IspyError::Config("timing.time_unit_ms must be > 0".into()));
        }
        self.batch_work_units.validate("timing.batch_work_units")?;
        self.reply_latency_units.validate("timing.reply_latency_units")?;
        for (name, value) in [
            ("timing.stagger_units", self.stagger_units),
            ("timing.single_run_units", self.single_run_units),
        ] {
            if !(value >= 0.0) {
                return Err(IspyError::Config(format!("{} must be >= 0", name)));
            }
        }
        for (name, value) in [
            ("timing.refresh_interval_units", self.refresh_interval_units),
            ("timing.scan_timeout_units", self.scan_timeout_units),
        ] {
            if !(value > 0.0) {
                return Err(IspyError::Config(format!("{} must be > 0", name)));
            }
        }
        Ok(())
    }
}

/// Activity log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_activity_capacity")]
    pub capacity: usize,
}

fn default_activity_capacity() -> usize {
    DEFAULT_ACTIVITY_CAPACITY
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            capacity: default_activity_capacity(),
        }
    }
}

/// Analytics history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Samples kept per metric series
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Where per-device history files live. Defaults to the local data
    /// dir (`~/.local/share/ispy/analytics` on Linux).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl AnalyticsConfig {
    /// Resolved history directory, `None` when no data dir is known
    pub fn history_dir(&self) -> Option<PathBuf> {
        match &self.data_dir {
            Some(dir) => Some(dir.clone()),
            None => dirs::data_local_dir().map(|dir| dir.join("ispy").join(ANALYTICS_DIR)),
        }
    }
}

fn default_history_capacity() -> usize {
    1000
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            data_dir: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IspyConfig {
    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub activity: ActivityConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Fixed RNG seed for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl IspyConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: IspyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or the first discovered config file,
    /// or fall back to defaults when none exists.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path)?;
            return Self::from_toml_str(&content);
        }

        match Self::discover_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&content)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Config path discovery
    ///
    /// Priority:
    /// 1. $ISPY_CONFIG
    /// 2. $XDG_CONFIG_HOME/ispy/config.toml
    /// 3. ~/.config/ispy/config.toml (platform config dir)
    pub fn discover_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return Some(PathBuf::from(xdg).join("ispy").join(CONFIG_FILE));
            }
        }

        dirs::config_dir().map(|dir| dir.join("ispy").join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        if self.activity.capacity == 0 {
            return Err(IspyError::Config("activity.capacity must be >= 1".into()));
        }
        if self.analytics.history_capacity == 0 {
            return Err(IspyError::Config(
                "analytics.history_capacity must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IspyError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IspyConfig::default();
        assert_eq!(config.timing.time_unit_ms, 1000);
        assert_eq!(config.timing.stagger(), Duration::from_millis(500));
        assert_eq!(config.timing.single_run(), Duration::from_secs(3));
        assert_eq!(config.timing.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.activity.capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = IspyConfig::from_toml_str("").unwrap();
        assert_eq!(config.timing.batch_work_units, UnitRange::new(2.0, 3.0));
        assert_eq!(config.timing.reply_latency_units, UnitRange::new(1.5, 3.0));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_partial_override() {
        let config = IspyConfig::from_toml_str(
            r#"
            seed = 7

            [timing]
            time_unit_ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.timing.duration(3.0), Duration::from_millis(30));
        assert_eq!(config.timing.stagger_units, 0.5);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let err = IspyConfig::from_toml_str(
            r#"
            [timing]
            batch_work_units = { min = 3.0, max = 2.0 }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, IspyError::Config(_)));
    }

    #[test]
    fn test_zero_time_unit_rejected() {
        let err = IspyConfig::from_toml_str("[timing]\ntime_unit_ms = 0\n").unwrap_err();
        assert!(matches!(err, IspyError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip_keeps_timing() {
        let mut config = IspyConfig::default();
        config.seed = Some(42);
        let text = config.to_toml_string().unwrap();
        let parsed = IspyConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.seed, Some(42));
        assert_eq!(parsed.timing.time_unit_ms, 1000);
    }

    #[test]
    fn test_explicit_history_dir() {
        let config = IspyConfig::from_toml_str(
            r#"
            [analytics]
            data_dir = "/var/lib/ispy"
            "#,
        )
        .unwrap();
        assert_eq!(config.analytics.history_capacity, 1000);
        assert_eq!(
            config.analytics.history_dir(),
            Some(PathBuf::from("/var/lib/ispy"))
        );
    }

    #[test]
    fn test_negative_duration_clamped() {
        let timing = TimingConfig::default();
        assert_eq!(timing.duration(-1.0), Duration::ZERO);
        assert_eq!(timing.duration(f64::NAN), Duration::ZERO);
    }
}
