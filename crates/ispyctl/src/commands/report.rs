//! `ispyctl report`

use super::analytics::sample_now;
use super::scan::{run_batch, RunEnd};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use ispy_engine::{render_report, DeviceAnalytics};
use std::path::Path;

/// Samples taken back to back for the analytics section
const REPORT_SAMPLES: usize = 3;

/// Analysis window for the analytics section
const REPORT_WINDOW_DAYS: i64 = 30;

pub async fn run(session: &Session, output: Option<&Path>) -> Result<()> {
    let markdown = build(session, output.is_some()).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &markdown)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", markdown),
    }
    Ok(())
}

/// Full batch scan, then the diagnostic report followed by the analytics
/// report for the selected device. The activity section only lists this
/// scan.
pub async fn build(session: &Session, show_progress: bool) -> Result<String> {
    session.orchestrator.clear_activity().await;
    if run_batch(&session.orchestrator, show_progress).await? == RunEnd::Cancelled {
        bail!("Scan cancelled, no report written");
    }

    let now = chrono::Utc::now();
    let device = session.selected_device().await;
    let snapshot = session.orchestrator.snapshot().await;
    let mut markdown = render_report(device.as_ref(), &snapshot, now);

    if let Some(device) = device {
        let mut analytics = DeviceAnalytics::open(device.id, &session.config)
            .context("Failed to open analytics history")?;
        sample_now(session, &mut analytics, REPORT_SAMPLES).await?;
        markdown.push('\n');
        markdown.push_str(&analytics.render_markdown(REPORT_WINDOW_DAYS, now));
    }
    Ok(markdown)
}
