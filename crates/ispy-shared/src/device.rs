//! Device records shown on the dashboard.

use serde::{Deserialize, Serialize};

/// Battery bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryStatus {
    /// 50 and above
    Good,
    /// 20 to 49
    Low,
    /// Below 20
    Critical,
}

impl BatteryStatus {
    pub fn from_level(level: u8) -> Self {
        match level {
            50.. => BatteryStatus::Good,
            20..=49 => BatteryStatus::Low,
            _ => BatteryStatus::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatteryStatus::Good => "Good",
            BatteryStatus::Low => "Low",
            BatteryStatus::Critical => "Critical",
        }
    }
}

/// Storage bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Healthy,
    Moderate,
    Critical,
}

impl StorageStatus {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 70.0 {
            StorageStatus::Healthy
        } else if percent < 85.0 {
            StorageStatus::Moderate
        } else {
            StorageStatus::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StorageStatus::Healthy => "Healthy",
            StorageStatus::Moderate => "Moderate",
            StorageStatus::Critical => "Critical",
        }
    }
}

/// Connected (mock) device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// UDID-style identifier
    pub id: String,
    pub name: String,
    pub model: String,
    pub os_version: String,
    /// 0-100
    pub battery_level: u8,
    #[serde(default)]
    pub battery_cycle_count: u32,
    pub storage_used_gb: f64,
    pub storage_total_gb: f64,
    pub connected: bool,
}

impl Device {
    /// Used / total as a percentage, 0 when total is unknown
    pub fn storage_percent(&self) -> f64 {
        if self.storage_total_gb <= 0.0 {
            return 0.0;
        }
        self.storage_used_gb / self.storage_total_gb * 100.0
    }

    pub fn storage_free_gb(&self) -> f64 {
        (self.storage_total_gb - self.storage_used_gb).max(0.0)
    }

    pub fn battery_status(&self) -> BatteryStatus {
        BatteryStatus::from_level(self.battery_level)
    }

    pub fn storage_status(&self) -> StorageStatus {
        StorageStatus::from_percent(self.storage_percent())
    }

    /// First 8 characters of the id, for tables
    pub fn short_id(&self) -> String {
        match self.id.char_indices().nth(8) {
            Some((end, _)) => format!("{}...", &self.id[..end]),
            None => self.id.clone(),
        }
    }
}
