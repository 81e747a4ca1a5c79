//! Device analytics: metric history and trend analysis.
//!
//! Three series per device (battery, storage usage, thermal state), each
//! holding at most `history_capacity` samples. Battery samples carry the
//! charge cycle count when the device reports one. Trend direction is the
//! sign of a least-squares slope over the samples inside the window.
//!
//! History opened with [`DeviceAnalytics::open`] is kept as JSON under
//! `<data_dir>/<device id>/{battery,storage,performance}_history.json` and
//! rewritten after every sample.

use crate::sim::{make_rng, STREAM_ANALYTICS};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ispy_shared::config::IspyConfig;
use ispy_shared::{Device, Result};
use rand::rngs::StdRng;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Slope magnitude below which a series counts as stable
pub const TREND_SLOPE_THRESHOLD: f64 = 0.1;

/// Samples needed inside the window before a metric is analysed
pub const MIN_SAMPLES: usize = 3;

/// Thermal score above which thermal performance is considered stable
pub const THERMAL_STABLE_SCORE: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Improving => "Improving",
            Self::Stable => "Stable",
            Self::Degrading => "Degrading",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Improving => "↗",
            Self::Stable => "→",
            Self::Degrading => "↘",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Device thermal state as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalState {
    Normal,
    Fair,
    Serious,
    Critical,
}

impl ThermalState {
    /// Serious and Critical count as thermal issues
    pub fn is_issue(&self) -> bool {
        matches!(self, Self::Serious | Self::Critical)
    }

    /// Mock reading, mostly Normal
    pub fn sample(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..100) {
            0..=69 => Self::Normal,
            70..=89 => Self::Fair,
            90..=97 => Self::Serious,
            _ => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    BatteryLevel,
    BatteryCycles,
    StorageUsage,
    Thermal,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::BatteryLevel,
        Metric::BatteryCycles,
        Metric::StorageUsage,
        Metric::Thermal,
    ];

    /// Short key accepted on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::BatteryLevel => "battery",
            Self::BatteryCycles => "cycles",
            Self::StorageUsage => "storage",
            Self::Thermal => "thermal",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BatteryLevel => "Battery Level",
            Self::BatteryCycles => "Battery Cycles",
            Self::StorageUsage => "Storage Usage",
            Self::Thermal => "Thermal Performance",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::BatteryLevel => 0.7,
            Self::BatteryCycles => 0.8,
            Self::StorageUsage => 0.9,
            Self::Thermal => 0.6,
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "battery" | "battery_level" => Ok(Self::BatteryLevel),
            "cycles" | "battery_cycles" => Ok(Self::BatteryCycles),
            "storage" | "storage_usage" => Ok(Self::StorageUsage),
            "thermal" => Ok(Self::Thermal),
            other => Err(format!(
                "unknown metric '{}' (expected battery, cycles, storage or thermal)",
                other
            )),
        }
    }
}

/// One reading of every tracked metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub battery_level: f64,
    pub cycle_count: Option<u32>,
    pub storage_percent: f64,
    pub thermal: ThermalState,
}

impl Reading {
    pub fn from_device(device: &Device, thermal: ThermalState) -> Self {
        Self {
            battery_level: f64::from(device.battery_level),
            cycle_count: Some(device.battery_cycle_count),
            storage_percent: device.storage_percent(),
            thermal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Sample<T> {
    #[serde(rename = "timestamp")]
    at: DateTime<Utc>,
    value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct BatterySample {
    level: f64,
    #[serde(default)]
    cycle_count: Option<u32>,
}

const BATTERY_SERIES: &str = "battery";
const STORAGE_SERIES: &str = "storage";
const PERFORMANCE_SERIES: &str = "performance";

/// JSON history files for one device
#[derive(Debug, Clone)]
struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    fn new(base: &Path, device_id: &str) -> Self {
        Self {
            dir: base.join(device_dir_name(device_id)),
        }
    }

    fn path(&self, series: &str) -> PathBuf {
        self.dir.join(format!("{}_history.json", series))
    }

    /// Missing file is an empty history; an unreadable one is discarded
    fn load<T: DeserializeOwned>(
        &self,
        series: &str,
        capacity: usize,
    ) -> Result<VecDeque<Sample<T>>> {
        let path = self.path(series);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(VecDeque::new()),
            Err(e) => return Err(e.into()),
        };
        let mut samples: VecDeque<Sample<T>> = match serde_json::from_str(&content) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Discarding unreadable history {}: {}", path.display(), e);
                VecDeque::new()
            }
        };
        while samples.len() > capacity {
            samples.pop_front();
        }
        Ok(samples)
    }

    fn save<T: Serialize>(&self, series: &str, samples: &VecDeque<Sample<T>>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(samples)?;
        std::fs::write(self.path(series), json)?;
        Ok(())
    }
}

/// Device ids become directory names; anything outside `[A-Za-z0-9_-]`
/// is replaced
fn device_dir_name(device_id: &str) -> String {
    let name: String = device_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

/// Outcome of analysing one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResult {
    pub metric: Metric,
    pub metric_name: String,
    pub current_value: f64,
    pub trend: Trend,
    pub prediction: Option<f64>,
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

impl AnalyticsResult {
    fn new(metric: Metric, current_value: f64, trend: Trend, prediction: Option<f64>) -> Self {
        Self {
            metric,
            metric_name: metric.name().to_string(),
            current_value,
            trend,
            prediction,
            confidence: metric.confidence(),
            recommendations: Vec::new(),
        }
    }

    fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

/// One point of a chart series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

pub struct DeviceAnalytics {
    device_id: String,
    capacity: usize,
    battery: VecDeque<Sample<BatterySample>>,
    storage: VecDeque<Sample<f64>>,
    thermal: VecDeque<Sample<ThermalState>>,
    store: Option<HistoryStore>,
    rng: StdRng,
}

impl DeviceAnalytics {
    /// In-memory history, nothing is written to disk
    pub fn new(device_id: impl Into<String>, config: &IspyConfig) -> Self {
        Self {
            device_id: device_id.into(),
            capacity: config.analytics.history_capacity.max(1),
            battery: VecDeque::new(),
            storage: VecDeque::new(),
            thermal: VecDeque::new(),
            store: None,
            rng: make_rng(config.seed, STREAM_ANALYTICS),
        }
    }

    /// History backed by the configured data dir, loading what earlier
    /// runs recorded. Falls back to in-memory history when no data dir is
    /// known.
    pub fn open(device_id: impl Into<String>, config: &IspyConfig) -> Result<Self> {
        let mut analytics = Self::new(device_id, config);
        let Some(base) = config.analytics.history_dir() else {
            warn!("No data directory, analytics history is not persisted");
            return Ok(analytics);
        };

        let store = HistoryStore::new(&base, &analytics.device_id);
        analytics.battery = store.load(BATTERY_SERIES, analytics.capacity)?;
        analytics.storage = store.load(STORAGE_SERIES, analytics.capacity)?;
        analytics.thermal = store.load(PERFORMANCE_SERIES, analytics.capacity)?;
        debug!(
            "Loaded {} analytics samples for {} from {}",
            analytics.sample_count(),
            analytics.device_id,
            store.dir.display()
        );
        analytics.store = Some(store);
        Ok(analytics)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Directory the history is written to, if persisted
    pub fn history_dir(&self) -> Option<&Path> {
        self.store.as_ref().map(|s| s.dir.as_path())
    }

    /// Number of samples in the largest series
    pub fn sample_count(&self) -> usize {
        self.battery
            .len()
            .max(self.storage.len())
            .max(self.thermal.len())
    }

    /// Record the current readings of `device`. Thermal state comes from
    /// the mock source.
    pub fn collect_sample(&mut self, device: &Device) -> Result<ThermalState> {
        let thermal = ThermalState::sample(&mut self.rng);
        self.record_at(Utc::now(), Reading::from_device(device, thermal))?;
        Ok(thermal)
    }

    pub fn record_at(&mut self, at: DateTime<Utc>, reading: Reading) -> Result<()> {
        let battery = BatterySample {
            level: reading.battery_level,
            cycle_count: reading.cycle_count,
        };
        push_bounded(&mut self.battery, Sample { at, value: battery }, self.capacity);
        let storage = Sample {
            at,
            value: reading.storage_percent,
        };
        push_bounded(&mut self.storage, storage, self.capacity);
        let thermal = Sample {
            at,
            value: reading.thermal,
        };
        push_bounded(&mut self.thermal, thermal, self.capacity);

        if let Some(store) = &self.store {
            store.save(BATTERY_SERIES, &self.battery)?;
            store.save(STORAGE_SERIES, &self.storage)?;
            store.save(PERFORMANCE_SERIES, &self.thermal)?;
        }
        Ok(())
    }

    pub fn analyze_trends(&self, window_days: i64) -> Vec<AnalyticsResult> {
        self.analyze_trends_at(window_days, Utc::now())
    }

    /// Results for every metric with enough samples inside the window, in
    /// battery level, battery cycles, storage, thermal order.
    ///
    /// Cycle analysis needs the battery window to qualify and at least two
    /// reported cycle counts inside it.
    pub fn analyze_trends_at(
        &self,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Vec<AnalyticsResult> {
        let cutoff = now - ChronoDuration::days(window_days.max(0));
        let mut results = Vec::new();

        let battery = values_since(&self.battery, cutoff);
        if battery.len() >= MIN_SAMPLES {
            let levels: Vec<f64> = battery.iter().map(|b| b.level).collect();
            if let Some(&current) = levels.last() {
                let trend = calculate_trend(&levels);
                let prediction = predict_next(&levels);
                results.push(
                    AnalyticsResult::new(Metric::BatteryLevel, current, trend, prediction)
                        .with_recommendations(battery_recommendations(trend, current)),
                );
            }

            let cycles: Vec<f64> = battery
                .iter()
                .filter_map(|b| b.cycle_count)
                .map(f64::from)
                .collect();
            if cycles.len() > 1 {
                if let Some(&current) = cycles.last() {
                    let trend = calculate_trend(&cycles);
                    let prediction = predict_next(&cycles);
                    results.push(
                        AnalyticsResult::new(Metric::BatteryCycles, current, trend, prediction)
                            .with_recommendations(cycle_recommendations(current)),
                    );
                }
            }
        }

        let usage = values_since(&self.storage, cutoff);
        if usage.len() >= MIN_SAMPLES {
            if let Some(&current) = usage.last() {
                let trend = calculate_trend(&usage);
                let prediction = predict_next(&usage);
                results.push(
                    AnalyticsResult::new(Metric::StorageUsage, current, trend, prediction)
                        .with_recommendations(storage_recommendations(trend, current)),
                );
            }
        }

        let states = values_since(&self.thermal, cutoff);
        if states.len() >= MIN_SAMPLES {
            let score = thermal_score(&states);
            let trend = if score > THERMAL_STABLE_SCORE {
                Trend::Stable
            } else {
                Trend::Degrading
            };
            results.push(
                AnalyticsResult::new(Metric::Thermal, score, trend, None)
                    .with_recommendations(thermal_recommendations(score)),
            );
        }

        debug!(
            "Analysed {}-day window for {}: {} metrics",
            window_days,
            self.device_id,
            results.len()
        );
        results
    }

    /// Chart points for one metric inside the window. Thermal points are
    /// the running thermal score.
    pub fn chart_series(
        &self,
        metric: Metric,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Vec<ChartPoint> {
        let cutoff = now - ChronoDuration::days(window_days.max(0));
        match metric {
            Metric::BatteryLevel => series_points(&self.battery, cutoff, |b| Some(b.level)),
            Metric::BatteryCycles => {
                series_points(&self.battery, cutoff, |b| b.cycle_count.map(f64::from))
            }
            Metric::StorageUsage => series_points(&self.storage, cutoff, |v| Some(*v)),
            Metric::Thermal => {
                let mut seen = Vec::new();
                series_points(&self.thermal, cutoff, |state| {
                    seen.push(*state);
                    Some(thermal_score(&seen))
                })
            }
        }
    }

    pub fn render_markdown(&self, window_days: i64, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Device Analytics Report");
        let _ = writeln!(out, "**Device:** {}", self.device_id);
        let _ = writeln!(out, "**Analysis Period:** {} days", window_days);
        let _ = writeln!(out, "**Generated:** {}", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Trend Analysis Summary");
        let _ = writeln!(out);

        let results = self.analyze_trends_at(window_days, now);
        if results.is_empty() {
            let _ = writeln!(
                out,
                "Insufficient data for trend analysis. Collect at least {} samples and run again.",
                MIN_SAMPLES
            );
            return out;
        }

        for result in &results {
            let _ = writeln!(out, "### {} {}", result.metric_name, result.trend.symbol());
            let _ = writeln!(out, "- **Current Value:** {:.1}", result.current_value);
            let _ = writeln!(out, "- **Trend:** {}", result.trend.label());
            match result.prediction {
                Some(p) => {
                    let _ = writeln!(out, "- **Prediction:** {:.2}", p);
                }
                None => {
                    let _ = writeln!(out, "- **Prediction:** N/A");
                }
            }
            let _ = writeln!(out, "- **Confidence:** {:.0}%", result.confidence * 100.0);
            if !result.recommendations.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "**Recommendations:**");
                for rec in &result.recommendations {
                    let _ = writeln!(out, "- {}", rec);
                }
            }
            let _ = writeln!(out);
        }
        out
    }
}

fn push_bounded<T>(series: &mut VecDeque<Sample<T>>, sample: Sample<T>, capacity: usize) {
    series.push_back(sample);
    while series.len() > capacity {
        series.pop_front();
    }
}

fn values_since<T: Copy>(series: &VecDeque<Sample<T>>, cutoff: DateTime<Utc>) -> Vec<T> {
    series
        .iter()
        .filter(|s| s.at >= cutoff)
        .map(|s| s.value)
        .collect()
}

fn series_points<T>(
    series: &VecDeque<Sample<T>>,
    cutoff: DateTime<Utc>,
    mut value: impl FnMut(&T) -> Option<f64>,
) -> Vec<ChartPoint> {
    series
        .iter()
        .filter(|s| s.at >= cutoff)
        .filter_map(|s| {
            value(&s.value).map(|v| ChartPoint {
                label: s.at.format("%m-%d %H:%M").to_string(),
                value: v,
            })
        })
        .collect()
}

/// Least-squares fit over `(index, value)`, returns `(slope, intercept)`
fn linear_fit(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    let slope = num / den;
    Some((slope, mean_y - slope * mean_x))
}

pub fn calculate_trend(values: &[f64]) -> Trend {
    match linear_fit(values) {
        Some((slope, _)) if slope > TREND_SLOPE_THRESHOLD => Trend::Improving,
        Some((slope, _)) if slope < -TREND_SLOPE_THRESHOLD => Trend::Degrading,
        _ => Trend::Stable,
    }
}

/// Linear fit evaluated at the next index, rounded to 2 decimals
pub fn predict_next(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_SAMPLES {
        return None;
    }
    let (slope, intercept) = linear_fit(values)?;
    let next = slope * values.len() as f64 + intercept;
    Some((next * 100.0).round() / 100.0)
}

/// 100 minus the share of samples with a thermal issue
pub fn thermal_score(states: &[ThermalState]) -> f64 {
    if states.is_empty() {
        return 100.0;
    }
    let issues = states.iter().filter(|s| s.is_issue()).count();
    (100.0 - issues as f64 / states.len() as f64 * 100.0).max(0.0)
}

fn battery_recommendations(trend: Trend, current: f64) -> Vec<String> {
    let mut recs = Vec::new();
    if trend == Trend::Degrading {
        recs.extend(
            [
                "Battery performance declining - monitor closely",
                "Consider enabling Low Power Mode more frequently",
                "Reduce screen brightness and background app refresh",
            ]
            .map(String::from),
        );
    }
    if current < 20.0 {
        recs.push("Charge device soon to avoid shutdown".to_string());
    }
    recs
}

fn cycle_recommendations(cycle_count: f64) -> Vec<String> {
    let mut recs = Vec::new();
    if cycle_count > 500.0 {
        recs.extend(
            [
                "Battery cycle count is high - consider replacement",
                "Enable Optimized Battery Charging",
                "Avoid frequent full charge/discharge cycles",
            ]
            .map(String::from),
        );
    }
    if cycle_count > 1000.0 {
        recs.push("Battery replacement strongly recommended".to_string());
    }
    recs
}

fn storage_recommendations(trend: Trend, current: f64) -> Vec<String> {
    let mut recs = Vec::new();
    if trend == Trend::Degrading || current > 85.0 {
        recs.extend(
            [
                "Storage usage increasing rapidly",
                "Delete unused apps and files",
                "Enable Optimize iPhone Storage for Photos",
                "Review and delete large attachments",
            ]
            .map(String::from),
        );
    }
    if current > 95.0 {
        recs.push("Critical storage level - immediate cleanup needed".to_string());
    }
    recs
}

fn thermal_recommendations(score: f64) -> Vec<String> {
    if score >= 70.0 {
        return Vec::new();
    }
    [
        "Device overheating frequently",
        "Avoid intensive tasks while charging",
        "Remove case during heavy usage",
        "Keep device out of direct sunlight",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analytics() -> DeviceAnalytics {
        DeviceAnalytics::new("test-device", &IspyConfig::default())
    }

    fn reading(level: f64, storage: f64, thermal: ThermalState) -> Reading {
        Reading {
            battery_level: level,
            cycle_count: None,
            storage_percent: storage,
            thermal,
        }
    }

    #[test]
    fn test_trend_direction() {
        assert_eq!(calculate_trend(&[10.0, 20.0, 30.0]), Trend::Improving);
        assert_eq!(calculate_trend(&[30.0, 20.0, 10.0]), Trend::Degrading);
        assert_eq!(calculate_trend(&[50.0, 50.05, 50.0]), Trend::Stable);
        assert_eq!(calculate_trend(&[42.0]), Trend::Stable);
    }

    #[test]
    fn test_predict_next() {
        assert_eq!(predict_next(&[10.0, 20.0, 30.0]), Some(40.0));
        assert_eq!(predict_next(&[1.0, 2.0]), None);
        assert_eq!(predict_next(&[1.0, 1.5, 1.7]), Some(2.1));
    }

    #[test]
    fn test_thermal_score() {
        use ThermalState::*;
        assert_eq!(thermal_score(&[Normal, Fair, Normal, Normal]), 100.0);
        assert_eq!(thermal_score(&[Normal, Serious, Critical, Normal]), 50.0);
    }

    #[test]
    fn test_metric_keys_parse() {
        for metric in Metric::ALL {
            assert_eq!(metric.key().parse::<Metric>(), Ok(metric));
        }
        assert_eq!("Battery_Level".parse::<Metric>(), Ok(Metric::BatteryLevel));
        assert!("memory".parse::<Metric>().is_err());
    }

    #[test]
    fn test_insufficient_samples() {
        let now = Utc::now();
        let mut a = analytics();
        a.record_at(now, reading(80.0, 50.0, ThermalState::Normal)).unwrap();
        a.record_at(now, reading(79.0, 51.0, ThermalState::Normal)).unwrap();
        assert!(a.analyze_trends_at(30, now).is_empty());
        assert!(a.render_markdown(30, now).contains("Insufficient data"));
    }

    #[test]
    fn test_window_excludes_old_samples() {
        let now = Utc::now();
        let mut a = analytics();
        let old = now - ChronoDuration::days(40);
        for _ in 0..3 {
            a.record_at(old, reading(90.0, 40.0, ThermalState::Normal)).unwrap();
        }
        a.record_at(now, reading(50.0, 60.0, ThermalState::Normal)).unwrap();
        assert!(a.analyze_trends_at(30, now).is_empty());
        assert_eq!(a.analyze_trends_at(60, now).len(), 3);
    }

    #[test]
    fn test_draining_battery_and_filling_storage() {
        let now = Utc::now();
        let mut a = analytics();
        for (i, level) in [60.0, 40.0, 18.0].iter().enumerate() {
            let at = now - ChronoDuration::hours(3 - i as i64);
            let storage = 90.0 + i as f64 * 3.0;
            a.record_at(at, reading(*level, storage, ThermalState::Serious))
                .unwrap();
        }
        let results = a.analyze_trends_at(30, now);
        assert_eq!(results.len(), 3);

        let battery = &results[0];
        assert_eq!(battery.metric, Metric::BatteryLevel);
        assert_eq!(battery.trend, Trend::Degrading);
        assert_eq!(battery.current_value, 18.0);
        assert_eq!(battery.confidence, 0.7);
        assert!(battery
            .recommendations
            .iter()
            .any(|r| r == "Charge device soon to avoid shutdown"));

        let storage = &results[1];
        assert_eq!(storage.trend, Trend::Improving);
        assert!(storage
            .recommendations
            .iter()
            .any(|r| r.starts_with("Critical storage level")));

        let thermal = &results[2];
        assert_eq!(thermal.current_value, 0.0);
        assert_eq!(thermal.trend, Trend::Degrading);
        assert_eq!(thermal.prediction, None);
        assert_eq!(thermal.recommendations.len(), 4);
    }

    #[test]
    fn test_cycle_count_trend() {
        let now = Utc::now();
        let mut a = analytics();
        for (i, cycles) in [480, 500, 520].into_iter().enumerate() {
            let at = now - ChronoDuration::days(3 - i as i64);
            let mut r = reading(70.0, 40.0, ThermalState::Normal);
            r.cycle_count = Some(cycles);
            a.record_at(at, r).unwrap();
        }

        let results = a.analyze_trends_at(30, now);
        assert_eq!(results.len(), 4);
        let cycles = &results[1];
        assert_eq!(cycles.metric, Metric::BatteryCycles);
        assert_eq!(cycles.metric_name, "Battery Cycles");
        assert_eq!(cycles.current_value, 520.0);
        assert_eq!(cycles.trend, Trend::Improving);
        assert_eq!(cycles.prediction, Some(540.0));
        assert_eq!(cycles.confidence, 0.8);
        assert_eq!(cycles.recommendations.len(), 3);
        assert!(a.render_markdown(30, now).contains("### Battery Cycles"));
    }

    #[test]
    fn test_cycle_recommendations() {
        assert!(cycle_recommendations(320.0).is_empty());
        assert_eq!(cycle_recommendations(613.0).len(), 3);
        let worn = cycle_recommendations(1087.0);
        assert_eq!(worn.len(), 4);
        assert_eq!(worn[3], "Battery replacement strongly recommended");
    }

    #[test]
    fn test_single_cycle_count_is_skipped() {
        let now = Utc::now();
        let mut a = analytics();
        for i in 0..3 {
            let mut r = reading(70.0, 40.0, ThermalState::Normal);
            r.cycle_count = (i == 2).then_some(900);
            a.record_at(now, r).unwrap();
        }
        let results = a.analyze_trends_at(30, now);
        assert!(results.iter().all(|r| r.metric != Metric::BatteryCycles));
        assert_eq!(a.chart_series(Metric::BatteryCycles, 30, now).len(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut config = IspyConfig::default();
        config.analytics.history_capacity = 5;
        let mut a = DeviceAnalytics::new("d", &config);
        let now = Utc::now();
        for i in 0..12 {
            a.record_at(now, reading(i as f64, 0.0, ThermalState::Normal))
                .unwrap();
        }
        assert_eq!(a.sample_count(), 5);
        let points = a.chart_series(Metric::BatteryLevel, 1, now);
        assert_eq!(points.first().map(|p| p.value), Some(7.0));
        assert_eq!(points.last().map(|p| p.value), Some(11.0));
    }

    #[test]
    fn test_thermal_chart_is_running_score() {
        use ThermalState::*;
        let now = Utc::now();
        let mut a = analytics();
        for state in [Normal, Critical, Normal, Normal] {
            a.record_at(now, reading(50.0, 50.0, state)).unwrap();
        }
        let values: Vec<f64> = a
            .chart_series(Metric::Thermal, 1, now)
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec![100.0, 50.0, 100.0 - 1.0 / 3.0 * 100.0, 75.0]);
    }

    #[test]
    fn test_device_dir_name() {
        assert_eq!(device_dir_name("00008130-0004A1B2"), "00008130-0004A1B2");
        assert_eq!(device_dir_name("../etc"), "___etc");
        assert_eq!(device_dir_name(""), "unknown");
    }

    #[test]
    fn test_seeded_thermal_samples_repeat() {
        let mut rng_a = make_rng(Some(11), STREAM_ANALYTICS);
        let mut rng_b = make_rng(Some(11), STREAM_ANALYTICS);
        for _ in 0..20 {
            assert_eq!(
                ThermalState::sample(&mut rng_a),
                ThermalState::sample(&mut rng_b)
            );
        }
    }
}
