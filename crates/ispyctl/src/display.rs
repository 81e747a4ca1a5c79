//! Terminal rendering for ispyctl.
//!
//! `format_*` functions build plain strings (tested), `print_*` functions
//! add color and write to stdout.

use ispy_engine::{AnalyticsResult, ChartPoint, Metric, OrchestratorSnapshot, Trend};
use ispy_shared::{
    ActivityItem, ActivityKind, BatteryStatus, ChatMessage, Device, DiagnosticModule, ModuleStatus,
    StorageStatus,
};
use owo_colors::OwoColorize;

pub const HR: &str = "────────────────────────────────────────────────────────────";

/// Name column width in the module table
const NAME_WIDTH: usize = 24;

/// ASCII bar, `width` cells filled in proportion to `percent`
pub fn health_bar(percent: f64, width: usize) -> String {
    let clamped = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn format_device_line(device: &Device, selected: bool) -> String {
    format!(
        "{} {:<24} {:<11} iOS {:<8} {:>3}%  {:>6.1}/{:<5.0} GB  {}",
        if selected { "*" } else { " " },
        device.name,
        device.model,
        device.os_version,
        device.battery_level,
        device.storage_used_gb,
        device.storage_total_gb,
        if device.connected { "connected" } else { "offline" }
    )
}

pub fn format_module_row(module: &DiagnosticModule) -> String {
    format!(
        "{:<width$} {:>3}%  {}  {}",
        module.name,
        module.score_percent(),
        health_bar(module.score(), 20),
        module.status().label(),
        width = NAME_WIDTH
    )
}

pub fn format_summary(snapshot: &OrchestratorSnapshot) -> String {
    let critical = match snapshot.critical_count {
        0 => "no critical issues".to_string(),
        1 => "1 critical issue".to_string(),
        n => format!("{} critical issues", n),
    };
    format!(
        "Overall health {:.0}% · {}",
        snapshot.overall_health, critical
    )
}

pub fn format_analytics_row(result: &AnalyticsResult) -> String {
    let prediction = result
        .prediction
        .map(|p| format!("{:.2}", p))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{:<20} {:>6.1}  {} {:<9}  next {:>7}  conf {:>3.0}%",
        result.metric_name,
        result.current_value,
        result.trend.symbol(),
        result.trend.label(),
        prediction,
        result.confidence * 100.0
    )
}

/// One chart line, the bar scaled against the largest value in the series
pub fn format_chart_row(point: &ChartPoint, max: f64) -> String {
    let percent = if max > 0.0 {
        point.value / max * 100.0
    } else {
        0.0
    };
    format!("{:<12} {:>8.1}  {}", point.label, point.value, health_bar(percent, 30))
}

fn colored_status(status: ModuleStatus) -> String {
    match status {
        ModuleStatus::Excellent => status.label().bright_green().to_string(),
        ModuleStatus::Good => status.label().green().to_string(),
        ModuleStatus::Warning => status.label().yellow().to_string(),
        ModuleStatus::Critical => status.label().bright_red().to_string(),
    }
}

fn kind_marker(kind: ActivityKind) -> String {
    match kind {
        ActivityKind::Success => "[OK]".bright_green().to_string(),
        ActivityKind::Info => "[..]".cyan().to_string(),
        ActivityKind::Warning => "[!!]".yellow().to_string(),
        ActivityKind::Error => "[XX]".bright_red().to_string(),
    }
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", HR.dimmed());
}

pub fn print_devices(devices: &[Device], selected: Option<&str>) {
    print_header("Devices");
    if devices.is_empty() {
        println!("{}", "No devices found".dimmed());
        return;
    }
    for device in devices {
        let is_selected = selected == Some(device.id.as_str());
        let line = format_device_line(device, is_selected);
        if is_selected {
            println!("{}", line.bright_cyan());
        } else if !device.connected {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }
}

pub fn print_device_detail(device: &Device) {
    let battery = format!("{}% ({})", device.battery_level, device.battery_status().label());
    let battery = match device.battery_status() {
        BatteryStatus::Good => battery.green().to_string(),
        BatteryStatus::Low => battery.yellow().to_string(),
        BatteryStatus::Critical => battery.bright_red().to_string(),
    };
    let storage = format!(
        "{:.0}% used, {:.1} GB free ({})",
        device.storage_percent(),
        device.storage_free_gb(),
        device.storage_status().label()
    );
    let storage = match device.storage_status() {
        StorageStatus::Healthy => storage.green().to_string(),
        StorageStatus::Moderate => storage.yellow().to_string(),
        StorageStatus::Critical => storage.bright_red().to_string(),
    };
    println!("{:<10} {} ({})", "device", device.name, device.short_id());
    println!("{:<10} {}", "battery", battery);
    println!("{:<10} {}", "storage", storage);
}

pub fn print_modules(modules: &[DiagnosticModule]) {
    print_header("Modules");
    for module in modules {
        let row = format_module_row(module);
        match module.status() {
            ModuleStatus::Excellent | ModuleStatus::Good => println!("{}", row),
            ModuleStatus::Warning => println!("{}", row.yellow()),
            ModuleStatus::Critical => println!("{}", row.bright_red()),
        }
    }
}

pub fn print_module_detail(module: &DiagnosticModule) {
    print_header(&module.name);
    println!("{}", module.description.dimmed());
    println!(
        "Score {}%  {}",
        module.score_percent(),
        colored_status(module.status())
    );
    for rec in module.recommendations() {
        println!("  - {}", rec);
    }
}

pub fn print_summary(snapshot: &OrchestratorSnapshot) {
    println!();
    let line = format_summary(snapshot);
    if snapshot.critical_count == 0 {
        println!("{}", line.bright_green());
    } else {
        println!("{}", line.yellow());
    }
}

pub fn print_activity(items: &[ActivityItem], limit: usize) {
    print_header("Recent activity");
    let now = chrono::Utc::now();
    for item in items.iter().take(limit) {
        println!(
            "{} {}  {}  {}",
            kind_marker(item.kind),
            item.title,
            item.subtitle.dimmed(),
            item.relative_label(now).dimmed()
        );
    }
}

pub fn print_analytics(results: &[AnalyticsResult]) {
    print_header("Trend analysis");
    if results.is_empty() {
        println!("{}", "Insufficient data for trend analysis".yellow());
        return;
    }
    for result in results {
        let row = format_analytics_row(result);
        match result.trend {
            Trend::Degrading => println!("{}", row.yellow()),
            _ => println!("{}", row),
        }
        for rec in &result.recommendations {
            println!("    - {}", rec.dimmed());
        }
    }
}

pub fn print_chart(metric: Metric, points: &[ChartPoint]) {
    print_header(&format!("{} chart", metric.name()));
    if points.is_empty() {
        println!("{}", "No samples in this window".dimmed());
        return;
    }
    let max = points.iter().map(|p| p.value).fold(0.0, f64::max);
    for point in points {
        println!("{}", format_chart_row(point, max));
    }
}

pub fn print_chat_message(message: &ChatMessage) {
    let who = format!("[{}]", message.origin);
    let who = if message.is_user() {
        who.bright_blue().to_string()
    } else {
        who.bright_cyan().to_string()
    };
    println!("{} {}  {}", message.time_label().dimmed(), who, message.content);
}
