//! Diagnostic module model.
//!
//! A module is a named check category (Battery Health, Storage Analysis, ...)
//! with a score and a status bucket. The status is always derived from the
//! score through `ModuleStatus::from_score`; it has no setter of its own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lower bound (inclusive) of the excellent bucket
pub const EXCELLENT_THRESHOLD: f64 = 90.0;
/// Lower bound (inclusive) of the good bucket
pub const GOOD_THRESHOLD: f64 = 70.0;
/// Lower bound (inclusive) of the warning bucket
pub const WARNING_THRESHOLD: f64 = 50.0;

/// Opaque module identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(Uuid);

impl ModuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status bucket derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl ModuleStatus {
    /// Map a score to its bucket. Boundaries belong to the higher bucket;
    /// NaN falls through to critical.
    pub fn from_score(score: f64) -> Self {
        if score >= EXCELLENT_THRESHOLD {
            ModuleStatus::Excellent
        } else if score >= GOOD_THRESHOLD {
            ModuleStatus::Good
        } else if score >= WARNING_THRESHOLD {
            ModuleStatus::Warning
        } else {
            ModuleStatus::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Excellent => "excellent",
            ModuleStatus::Good => "good",
            ModuleStatus::Warning => "warning",
            ModuleStatus::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModuleStatus::Excellent => "Excellent",
            ModuleStatus::Good => "Good",
            ModuleStatus::Warning => "Warning",
            ModuleStatus::Critical => "Critical",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ModuleStatus::Excellent | ModuleStatus::Good)
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-module scan phase. `Pending` means scheduled inside a batch but not
/// yet started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    #[default]
    Idle,
    Pending,
    Running,
    Done,
}

impl ScanPhase {
    /// Scheduled or in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, ScanPhase::Pending | ScanPhase::Running)
    }
}

/// Static catalog entry
#[derive(Debug, Clone, Copy)]
pub struct ModuleSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub baseline_score: f64,
}

/// Fixed module catalog. Order is the batch stagger order.
pub const CATALOG: [ModuleSpec; 9] = [
    ModuleSpec {
        key: "battery",
        name: "Battery Health",
        description: "Charge level, cycle count and capacity wear",
        icon: "battery.100",
        baseline_score: 87.0,
    },
    ModuleSpec {
        key: "storage",
        name: "Storage Analysis",
        description: "Disk usage, large files and cleanup candidates",
        icon: "internaldrive",
        baseline_score: 72.0,
    },
    ModuleSpec {
        key: "network",
        name: "Network Diagnostics",
        description: "Wi-Fi association and cellular availability",
        icon: "wifi",
        baseline_score: 94.0,
    },
    ModuleSpec {
        key: "security",
        name: "Security Analysis",
        description: "Passcode, activation lock and supervision state",
        icon: "lock.shield",
        baseline_score: 91.0,
    },
    ModuleSpec {
        key: "performance",
        name: "Performance Profiler",
        description: "CPU class, memory pressure and bottlenecks",
        icon: "speedometer",
        baseline_score: 78.0,
    },
    ModuleSpec {
        key: "thermal",
        name: "Thermal Monitor",
        description: "Thermal state and estimated temperature",
        icon: "thermometer",
        baseline_score: 83.0,
    },
    ModuleSpec {
        key: "backup",
        name: "Backup Manager",
        description: "Last backup age, encryption and locations",
        icon: "externaldrive.badge.timemachine",
        baseline_score: 65.0,
    },
    ModuleSpec {
        key: "accessibility",
        name: "Accessibility Analyzer",
        description: "VoiceOver, Zoom and available features",
        icon: "accessibility",
        baseline_score: 96.0,
    },
    ModuleSpec {
        key: "crashes",
        name: "Crash Log Analyzer",
        description: "Recent crash reports grouped by app",
        icon: "exclamationmark.triangle",
        baseline_score: 58.0,
    },
];

/// A diagnostic module card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticModule {
    pub id: ModuleId,
    /// Stable catalog key (e.g. "battery")
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    score: f64,
    status: ModuleStatus,
    pub phase: ScanPhase,
}

impl DiagnosticModule {
    pub fn from_spec(spec: &ModuleSpec) -> Self {
        let score = spec.baseline_score.clamp(0.0, 100.0);
        Self {
            id: ModuleId::new(),
            key: spec.key.to_string(),
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            icon: spec.icon.to_string(),
            score,
            status: ModuleStatus::from_score(score),
            phase: ScanPhase::Idle,
        }
    }

    /// Build the full catalog in stagger order
    pub fn catalog() -> Vec<Self> {
        CATALOG.iter().map(Self::from_spec).collect()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    /// Set the score (clamped to 0-100) and re-derive the status
    pub fn set_score(&mut self, score: f64) {
        self.score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 100.0)
        };
        self.status = ModuleStatus::from_score(self.score);
    }

    /// Rounded percentage for display
    pub fn score_percent(&self) -> u8 {
        self.score.round() as u8
    }

    pub fn is_running(&self) -> bool {
        self.phase == ScanPhase::Running
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// Follow-up advice for the current status
    pub fn recommendations(&self) -> &'static [&'static str] {
        if self.status.is_healthy() {
            return &[];
        }
        let critical = self.status == ModuleStatus::Critical;
        match (self.key.as_str(), critical) {
            ("battery", false) => &["Enable Optimized Battery Charging"],
            ("battery", true) => &[
                "Charge device immediately",
                "Consider battery replacement",
            ],
            ("storage", false) => &[
                "Review and delete large files",
                "Enable Optimize iPhone Storage",
            ],
            ("storage", true) => &[
                "Delete unused apps",
                "Clear cache and temporary files",
                "Offload unused apps",
            ],
            ("network", _) => &[
                "Check Wi-Fi settings and router",
                "Reset network settings if issues persist",
            ],
            ("security", false) => &["Review activation lock status"],
            ("security", true) => &[
                "Enable a device passcode",
                "Review activation lock status",
            ],
            ("performance", _) => &[
                "Close unused background apps",
                "Restart the device to clear memory",
            ],
            ("thermal", false) => &["Avoid intensive tasks while charging"],
            ("thermal", true) => &[
                "Let the device cool down",
                "Remove case during heavy usage",
            ],
            ("backup", false) => &["Create a fresh backup"],
            ("backup", true) => &[
                "Create a backup immediately",
                "Enable encrypted backups",
            ],
            ("accessibility", _) => &["Review accessibility features in Settings"],
            ("crashes", false) => &["Update frequently crashing apps"],
            ("crashes", true) => &[
                "Update or reinstall crashing apps",
                "Check available storage",
                "Update iOS to latest version",
            ],
            _ => &[],
        }
    }
}
