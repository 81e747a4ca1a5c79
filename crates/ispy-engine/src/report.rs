//! Markdown diagnostic report.

use crate::orchestrator::OrchestratorSnapshot;
use chrono::{DateTime, Utc};
use ispy_shared::Device;
use std::fmt::Write as _;

/// Activity entries included at the end of the report
pub const REPORT_ACTIVITY_LIMIT: usize = 5;

pub fn render_report(
    device: Option<&Device>,
    snapshot: &OrchestratorSnapshot,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# iSpy Diagnostic Report");
    let _ = writeln!(out, "**Generated:** {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);

    let _ = writeln!(out, "## Device Information");
    match device {
        Some(d) => {
            let _ = writeln!(out, "- **Name:** {}", d.name);
            let _ = writeln!(out, "- **Model:** {}", d.model);
            let _ = writeln!(out, "- **iOS Version:** {}", d.os_version);
            let _ = writeln!(out, "- **Identifier:** {}", d.id);
            let _ = writeln!(
                out,
                "- **Battery:** {}% ({})",
                d.battery_level,
                d.battery_status().label()
            );
            let _ = writeln!(
                out,
                "- **Storage:** {:.1} / {:.1} GB ({:.0}%, {})",
                d.storage_used_gb,
                d.storage_total_gb,
                d.storage_percent(),
                d.storage_status().label()
            );
            let _ = writeln!(
                out,
                "- **Connection:** {}",
                if d.connected { "Connected" } else { "Disconnected" }
            );
        }
        None => {
            let _ = writeln!(out, "No device selected.");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out, "- **Overall Health:** {:.0}%", snapshot.overall_health);
    let _ = writeln!(out, "- **Critical Issues:** {}", snapshot.critical_count);
    match snapshot.last_updated {
        Some(at) => {
            let _ = writeln!(out, "- **Last Full Scan:** {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        None => {
            let _ = writeln!(out, "- **Last Full Scan:** never");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Modules");
    for module in &snapshot.modules {
        let _ = writeln!(out);
        let _ = writeln!(out, "### {}", module.name);
        let _ = writeln!(out, "- **Score:** {}%", module.score_percent());
        let _ = writeln!(out, "- **Status:** {}", module.status().label());
        let recs = module.recommendations();
        if !recs.is_empty() {
            let _ = writeln!(out, "- **Recommendations:**");
            for rec in recs {
                let _ = writeln!(out, "  - {}", rec);
            }
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Recent Activity");
    if snapshot.activity.is_empty() {
        let _ = writeln!(out, "No recent activity.");
    }
    for item in snapshot.activity.iter().take(REPORT_ACTIVITY_LIMIT) {
        let _ = writeln!(
            out,
            "- **{}** {} ({})",
            item.title,
            item.subtitle,
            item.relative_label(now)
        );
    }
    out
}
