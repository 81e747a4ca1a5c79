//! `ispyctl analytics`

use crate::display;
use crate::session::Session;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ispy_engine::{DeviceAnalytics, Metric, RegistryEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub async fn run(
    session: &Session,
    samples: usize,
    days: i64,
    chart: Option<Metric>,
) -> Result<()> {
    let device = session.require_device().await?;
    let mut analytics = DeviceAnalytics::open(device.id.clone(), &session.config)
        .context("Failed to open analytics history")?;
    if let Some(dir) = analytics.history_dir() {
        debug!("Analytics history in {}", dir.display());
    }

    let bar = ProgressBar::new(samples as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} sampling [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let sampled = sample_on_refresh(session, &mut analytics, samples, &bar).await;
    bar.finish_and_clear();
    sampled?;

    println!();
    display::print_device_detail(&device);
    display::print_analytics(&analytics.analyze_trends(days));
    if let Some(metric) = chart {
        let points = analytics.chart_series(metric, days, chrono::Utc::now());
        display::print_chart(metric, &points);
    }
    Ok(())
}

/// Record one sample per device-list refresh, following the registry's
/// refresh loop until `samples` refreshes have been seen.
///
/// A failed refresh counts towards `samples` but records nothing.
pub async fn sample_on_refresh(
    session: &Session,
    analytics: &mut DeviceAnalytics,
    samples: usize,
    bar: &ProgressBar,
) -> Result<()> {
    let mut rx = session.registry.subscribe();
    let refresher = session.registry.spawn_refresh_loop();

    let result = async {
        let mut seen = 0;
        while seen < samples {
            match rx.recv().await {
                Ok(RegistryEvent::Refreshed { .. }) => {
                    record_selected(session, analytics).await?;
                }
                Ok(RegistryEvent::RefreshFailed { reason }) => {
                    warn!("Skipping sample: {}", reason);
                }
                Ok(RegistryEvent::SelectionChanged { .. }) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Missed {} registry events", n);
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
            seen += 1;
            bar.inc(1);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    refresher.abort();
    result
}

/// Refresh and sample `samples` times back to back
pub async fn sample_now(
    session: &Session,
    analytics: &mut DeviceAnalytics,
    samples: usize,
) -> Result<()> {
    for _ in 0..samples {
        if let Err(e) = session.registry.refresh().await {
            warn!("Skipping sample: {}", e);
            continue;
        }
        record_selected(session, analytics).await?;
    }
    Ok(())
}

async fn record_selected(session: &Session, analytics: &mut DeviceAnalytics) -> Result<()> {
    match session.registry.selected_device().await {
        Some(device) if device.id == analytics.device_id() => {
            analytics
                .collect_sample(&device)
                .context("Failed to save analytics sample")?;
        }
        _ => warn!("Device {} no longer listed", analytics.device_id()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ispy_shared::IspyConfig;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_samples_follow_refresh_loop() {
        let session = Session::start(IspyConfig::default(), None).await.unwrap();
        let device = session.require_device().await.unwrap();
        let mut analytics = DeviceAnalytics::new(device.id, &session.config);

        let start = tokio::time::Instant::now();
        let bar = ProgressBar::hidden();
        sample_on_refresh(&session, &mut analytics, 3, &bar)
            .await
            .unwrap();

        assert_eq!(analytics.sample_count(), 3);
        assert_eq!(bar.position(), 3);
        // refreshes at 0, 5 and 10 seconds
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(15));
        assert_eq!(analytics.analyze_trends(30).len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_now_takes_no_time() {
        let session = Session::start(IspyConfig::default(), None).await.unwrap();
        let device = session.require_device().await.unwrap();
        let mut analytics = DeviceAnalytics::new(device.id, &session.config);

        let start = tokio::time::Instant::now();
        sample_now(&session, &mut analytics, 4).await.unwrap();

        assert_eq!(analytics.sample_count(), 4);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_persists_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = IspyConfig::default();
        config.analytics.data_dir = Some(dir.path().to_path_buf());
        let session = Session::start(config, None).await.unwrap();
        let device = session.require_device().await.unwrap();

        run(&session, 2, 30, Some(Metric::BatteryCycles)).await.unwrap();
        run(&session, 2, 30, None).await.unwrap();

        let reopened = DeviceAnalytics::open(device.id, &session.config).unwrap();
        assert_eq!(reopened.sample_count(), 4);
    }
}
