//! `ispyctl scan`
//!
//! Drives a batch or single-module run and follows it through the
//! orchestrator's event stream. Ctrl-C cancels the run.

use crate::display;
use crate::session::Session;
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ispy_engine::{DiagnosticsOrchestrator, OrchestratorEvent, RunAllOutcome, RunOneOutcome};
use ispy_shared::{IspyError, ModuleId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// How a followed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    Cancelled,
}

pub async fn run(session: &Session, module: Option<&str>, json: bool) -> Result<()> {
    let orch = &session.orchestrator;

    let end = match module {
        Some(key) => {
            let id = orch.module_id(key).await?;
            run_single(orch, id, !json).await?
        }
        None => run_batch(orch, !json).await?,
    };

    let snapshot = orch.snapshot().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if let Some(device) = session.selected_device().await {
        println!();
        display::print_device_detail(&device);
    }
    match module {
        Some(key) => {
            if let Some(m) = snapshot.module_by_key(key) {
                display::print_module_detail(m);
            }
        }
        None => {
            display::print_modules(&snapshot.modules);
            display::print_summary(&snapshot);
        }
    }
    display::print_activity(&snapshot.activity, 5);

    if end == RunEnd::Cancelled {
        bail!("Scan cancelled");
    }
    Ok(())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_strings(SPINNER_FRAMES)
        .progress_chars("=> ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(SPINNER_FRAMES)
}

async fn module_names(orch: &DiagnosticsOrchestrator) -> HashMap<ModuleId, String> {
    orch.snapshot()
        .await
        .modules
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect()
}

/// Run every module and wait for the batch to finish
pub async fn run_batch(orch: &DiagnosticsOrchestrator, show_progress: bool) -> Result<RunEnd> {
    let names = module_names(orch).await;
    let mut rx = orch.subscribe();

    if orch.run_all().await == RunAllOutcome::Cancelled {
        // Only reachable when the orchestrator is shared with another driver
        return Ok(RunEnd::Cancelled);
    }

    let bar = if show_progress {
        ProgressBar::new(names.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(bar_style());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("starting");

    let end = loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                orch.cancel_all().await;
                break RunEnd::Cancelled;
            }
        };
        match event {
            Ok(OrchestratorEvent::ModuleStarted { id }) => {
                if let Some(name) = names.get(&id) {
                    bar.set_message(name.clone());
                }
            }
            Ok(OrchestratorEvent::ModuleCompleted { .. })
            | Ok(OrchestratorEvent::ModuleFailed { .. }) => bar.inc(1),
            Ok(OrchestratorEvent::BatchCompleted { .. }) => break RunEnd::Completed,
            Ok(OrchestratorEvent::Cancelled) => break RunEnd::Cancelled,
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => debug!("Progress lagged {} events", n),
            Err(RecvError::Closed) => break RunEnd::Completed,
        }
    };

    bar.finish_and_clear();
    Ok(end)
}

/// Run one module and wait for its result
pub async fn run_single(
    orch: &DiagnosticsOrchestrator,
    id: ModuleId,
    show_progress: bool,
) -> Result<RunEnd> {
    let name = orch
        .module(id)
        .await
        .map(|m| m.name)
        .ok_or_else(|| IspyError::UnknownModule(id.to_string()))?;
    let mut rx = orch.subscribe();

    if orch.run_one(id).await? == RunOneOutcome::AlreadyRunning {
        bail!("{} is already running", name);
    }

    let spinner = if show_progress {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Scanning {}...", name));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let end = loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                orch.cancel_all().await;
                break RunEnd::Cancelled;
            }
        };
        match event {
            Ok(OrchestratorEvent::ModuleCompleted { id: done, .. })
            | Ok(OrchestratorEvent::ModuleFailed { id: done, .. })
                if done == id =>
            {
                break RunEnd::Completed
            }
            Ok(OrchestratorEvent::Cancelled) => break RunEnd::Cancelled,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break RunEnd::Completed,
        }
    };

    spinner.finish_and_clear();
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ispy_engine::provider::ScriptedProvider;
    use ispy_shared::IspyConfig;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_run_batch_completes() {
        let orch = DiagnosticsOrchestrator::new(
            &IspyConfig::default(),
            Arc::new(ScriptedProvider::new(88.0)),
        );
        assert_eq!(run_batch(&orch, false).await.unwrap(), RunEnd::Completed);
        let snap = orch.snapshot().await;
        assert!((snap.overall_health - 88.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_single_completes() {
        let orch = DiagnosticsOrchestrator::new(
            &IspyConfig::default(),
            Arc::new(ScriptedProvider::new(12.0)),
        );
        let id = orch.module_id("backup").await.unwrap();
        assert_eq!(run_single(&orch, id, false).await.unwrap(), RunEnd::Completed);
        assert_eq!(orch.module(id).await.unwrap().score(), 12.0);
    }
}
