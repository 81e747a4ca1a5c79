//! Orchestrator scheduling tests.
//!
//! All tests run on a paused clock, so the simulated delays elapse
//! instantly and deterministically. Scores come from `ScriptedProvider`.

use ispy_engine::provider::{ScriptedProvider, ScriptedStep};
use ispy_engine::{
    render_report, DiagnosticsOrchestrator, OrchestratorEvent, ProviderError, RunAllOutcome,
    RunOneOutcome,
};
use ispy_shared::{ActivityKind, IspyConfig, IspyError, ModuleId, ModuleStatus, ScanPhase};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Helpers
// ============================================================================

fn seeded_config() -> IspyConfig {
    IspyConfig {
        seed: Some(7),
        ..IspyConfig::default()
    }
}

fn orchestrator(provider: &Arc<ScriptedProvider>) -> DiagnosticsOrchestrator {
    DiagnosticsOrchestrator::new(&seeded_config(), provider.clone())
}

fn secs(units: f64) -> Duration {
    Duration::from_secs_f64(units)
}

// ============================================================================
// Batch runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_batch_statistics_match_scores() {
    let provider = Arc::new(
        ScriptedProvider::new(80.0)
            .with_score("battery", 40.0)
            .with_score("storage", 95.0),
    );
    let orch = orchestrator(&provider);

    assert_eq!(orch.run_all().await, RunAllOutcome::Started);
    assert!(orch.is_batch_running().await);
    orch.wait_until_idle().await;

    let snap = orch.snapshot().await;
    let mean: f64 = snap.modules.iter().map(|m| m.score()).sum::<f64>() / 9.0;
    assert!((snap.overall_health - mean).abs() < 1e-9);
    assert!((snap.overall_health - 695.0 / 9.0).abs() < 1e-9);
    assert_eq!(snap.critical_count, 1);
    assert!(snap.last_updated.is_some());
    assert!(!snap.batch_in_progress);
    assert!(snap.modules.iter().all(|m| m.phase == ScanPhase::Done));
    assert_eq!(
        snap.module_by_key("battery").map(|m| m.status()),
        Some(ModuleStatus::Critical)
    );
    assert_eq!(provider.total_calls(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_batch_fills_activity_log_to_capacity() {
    let provider = Arc::new(ScriptedProvider::new(80.0).with_score("battery", 40.0));
    let orch = orchestrator(&provider);
    assert_eq!(orch.snapshot().await.activity.len(), 1);

    orch.run_all().await;
    orch.wait_until_idle().await;

    let snap = orch.snapshot().await;
    // seed entry + nine module entries + summary, capped at ten
    assert_eq!(snap.activity.len(), 10);
    assert!(!snap.activity.iter().any(|a| a.title == "Diagnostics ready"));

    let summary = &snap.activity[0];
    assert_eq!(summary.title, "Full diagnostic complete");
    assert_eq!(summary.subtitle, "Overall health 76% · 1 critical issue");
    assert_eq!(summary.kind, ActivityKind::Info);
}

#[tokio::test(start_paused = true)]
async fn test_batch_completes_within_stagger_bounds() {
    let provider = Arc::new(ScriptedProvider::new(85.0));
    let orch = orchestrator(&provider);

    let start = Instant::now();
    orch.run_all().await;
    orch.wait_until_idle().await;
    let elapsed = start.elapsed();

    // last module starts at 8 x 0.5, work takes [2, 3) units
    assert!(elapsed >= secs(6.0), "finished too early: {:?}", elapsed);
    assert!(elapsed < secs(9.0 * 0.5 + 3.0), "finished too late: {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_mock_batch_scenario() {
    let orch = DiagnosticsOrchestrator::with_mock(&seeded_config());

    let start = Instant::now();
    orch.run_all().await;
    orch.wait_until_idle().await;
    assert!(start.elapsed() <= secs(9.0 * 0.5 + 3.0));

    let snap = orch.snapshot().await;
    let mean: f64 = snap.modules.iter().map(|m| m.score()).sum::<f64>() / 9.0;
    assert!((30.0..=100.0).contains(&snap.overall_health));
    assert!((snap.overall_health - mean).abs() < 1e-9);
    assert_eq!(
        snap.critical_count,
        snap.modules
            .iter()
            .filter(|m| m.status() == ModuleStatus::Critical)
            .count()
    );
    assert_eq!(snap.activity.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_batch_staggers_module_starts() {
    let provider = Arc::new(ScriptedProvider::new(85.0));
    let orch = orchestrator(&provider);

    orch.run_all().await;
    tokio::time::sleep(secs(1.2)).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.running_count(), 3);
    assert_eq!(
        snap.modules
            .iter()
            .filter(|m| m.phase == ScanPhase::Pending)
            .count(),
        6
    );
    orch.wait_until_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_batch_events_in_order() {
    let provider = Arc::new(ScriptedProvider::new(90.0));
    let orch = orchestrator(&provider);
    let mut rx = orch.subscribe();

    orch.run_all().await;
    orch.wait_until_idle().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&OrchestratorEvent::BatchStarted { modules: 9 }));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, OrchestratorEvent::ModuleCompleted { .. }))
            .count(),
        9
    );
    assert!(matches!(
        events.last(),
        Some(OrchestratorEvent::BatchCompleted { critical_count: 0, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_clear_activity_after_batch() {
    let provider = Arc::new(ScriptedProvider::new(85.0));
    let orch = orchestrator(&provider);

    orch.run_all().await;
    orch.wait_until_idle().await;
    let before = orch.snapshot().await;
    assert_eq!(before.activity.len(), 10);

    let mut rx = orch.subscribe();
    orch.clear_activity().await;
    assert_eq!(rx.try_recv().unwrap(), OrchestratorEvent::ActivityCleared);

    let cleared = orch.snapshot().await;
    assert!(cleared.activity.is_empty());
    // module results and batch statistics survive the clear
    assert_eq!(cleared.overall_health, before.overall_health);
    assert_eq!(cleared.last_updated, before.last_updated);
    assert!(cleared.modules.iter().all(|m| m.score() == 85.0));

    let storage = orch.module_id("storage").await.unwrap();
    orch.run_one(storage).await.unwrap();
    orch.wait_until_idle().await;

    let activity = orch.snapshot().await.activity;
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].title, "Storage Analysis scan complete");
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_second_run_all_cancels_batch() {
    let provider = Arc::new(ScriptedProvider::new(20.0));
    let orch = orchestrator(&provider);
    let before = orch.snapshot().await;

    orch.run_all().await;
    tokio::time::sleep(secs(1.2)).await;
    assert_eq!(orch.run_all().await, RunAllOutcome::Cancelled);
    assert!(orch.is_idle().await);

    let calls_at_cancel = provider.total_calls();
    tokio::time::sleep(secs(60.0)).await;

    let after = orch.snapshot().await;
    // stale timers neither start scans nor write results
    assert_eq!(provider.total_calls(), calls_at_cancel);
    assert_eq!(after.activity.len(), before.activity.len());
    assert!(after.last_updated.is_none());
    for (a, b) in before.modules.iter().zip(after.modules.iter()) {
        assert_eq!(a.score(), b.score());
        assert_eq!(b.phase, ScanPhase::Idle);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_when_idle_is_harmless() {
    let provider = Arc::new(ScriptedProvider::new(80.0));
    let orch = orchestrator(&provider);
    let mut rx = orch.subscribe();

    orch.cancel_all().await;

    assert!(orch.is_idle().await);
    assert!(rx.try_recv().is_err());
    assert_eq!(orch.snapshot().await.activity.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_can_restart_after_cancel() {
    let provider = Arc::new(ScriptedProvider::new(75.0));
    let orch = orchestrator(&provider);

    orch.run_all().await;
    tokio::time::sleep(secs(0.2)).await;
    orch.run_all().await;
    assert_eq!(orch.run_all().await, RunAllOutcome::Started);
    orch.wait_until_idle().await;

    let snap = orch.snapshot().await;
    assert!(snap.modules.iter().all(|m| m.score() == 75.0));
    assert_eq!(snap.activity[0].title, "Full diagnostic complete");
}

#[tokio::test(start_paused = true)]
async fn test_batch_supersedes_single_run() {
    let provider = Arc::new(ScriptedProvider::new(80.0));
    let orch = orchestrator(&provider);
    let battery = orch.module_id("battery").await.unwrap();

    assert_eq!(orch.run_one(battery).await.unwrap(), RunOneOutcome::Started);
    orch.run_all().await;
    orch.wait_until_idle().await;
    tokio::time::sleep(secs(10.0)).await;

    let snap = orch.snapshot().await;
    let battery_entries = snap
        .activity
        .iter()
        .filter(|a| a.title == "Battery Health scan complete")
        .count();
    assert_eq!(battery_entries, 1);
    assert_eq!(provider.call_count("battery"), 2);
}

// ============================================================================
// Single-module runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_one_updates_only_that_module() {
    let provider = Arc::new(ScriptedProvider::new(80.0).with_score("battery", 20.0));
    let orch = orchestrator(&provider);
    let before = orch.snapshot().await;
    let battery = orch.module_id("battery").await.unwrap();

    let start = Instant::now();
    orch.run_one(battery).await.unwrap();
    assert!(orch.module(battery).await.unwrap().is_running());
    orch.wait_until_idle().await;
    assert!(start.elapsed() >= secs(3.0));

    let after = orch.snapshot().await;
    for (a, b) in before.modules.iter().zip(after.modules.iter()) {
        if a.id == battery {
            assert_eq!(b.score(), 20.0);
            assert_eq!(b.status(), ModuleStatus::Critical);
        } else {
            assert_eq!(a.score(), b.score());
            assert_eq!(a.status(), b.status());
        }
    }

    // health is recomputed, batch statistics are not
    let mean: f64 = after.modules.iter().map(|m| m.score()).sum::<f64>() / 9.0;
    assert!((after.overall_health - mean).abs() < 1e-9);
    assert_eq!(after.critical_count, before.critical_count);
    assert_eq!(after.last_updated, before.last_updated);

    let newest = &after.activity[0];
    assert_eq!(newest.title, "Battery Health scan complete");
    assert_eq!(newest.kind, ActivityKind::Error);
}

#[tokio::test(start_paused = true)]
async fn test_run_one_while_running_is_ignored() {
    let provider = Arc::new(ScriptedProvider::new(80.0));
    let orch = orchestrator(&provider);
    let storage = orch.module_id("storage").await.unwrap();

    orch.run_one(storage).await.unwrap();
    assert_eq!(
        orch.run_one(storage).await.unwrap(),
        RunOneOutcome::AlreadyRunning
    );
    orch.wait_until_idle().await;
    assert_eq!(provider.call_count("storage"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_module_is_an_error() {
    let provider = Arc::new(ScriptedProvider::new(80.0));
    let orch = orchestrator(&provider);

    let err = orch.run_one(ModuleId::new()).await.unwrap_err();
    assert!(matches!(err, IspyError::UnknownModule(_)));
    assert!(matches!(
        orch.module_id("bluetooth").await,
        Err(IspyError::UnknownModule(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_selection_resolves_from_collection() {
    let provider = Arc::new(ScriptedProvider::new(30.0));
    let orch = orchestrator(&provider);
    let thermal = orch.module_id("thermal").await.unwrap();

    orch.select_module(Some(thermal)).await.unwrap();
    orch.run_one(thermal).await.unwrap();
    orch.wait_until_idle().await;

    let selected = orch.snapshot().await.selected_module.unwrap();
    assert_eq!(selected.score(), 30.0);

    orch.select_module(None).await.unwrap();
    assert!(orch.snapshot().await.selected_module.is_none());
}

// ============================================================================
// Provider failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_provider_failure_marks_module_critical() {
    let provider = Arc::new(
        ScriptedProvider::new(80.0).with_failure("network", ProviderError::DeviceDisconnected),
    );
    let orch = orchestrator(&provider);

    orch.run_all().await;
    orch.wait_until_idle().await;

    let snap = orch.snapshot().await;
    let network = snap.module_by_key("network").unwrap();
    assert_eq!(network.score(), 0.0);
    assert_eq!(network.status(), ModuleStatus::Critical);
    assert_eq!(network.phase, ScanPhase::Done);
    assert_eq!(snap.critical_count, 1);

    let failure = snap
        .activity
        .iter()
        .find(|a| a.title == "Network Diagnostics scan failed")
        .unwrap();
    assert_eq!(failure.kind, ActivityKind::Error);
    assert_eq!(failure.subtitle, "Device disconnected");
}

#[tokio::test(start_paused = true)]
async fn test_hanging_provider_times_out() {
    let provider = Arc::new(ScriptedProvider::new(80.0).with_step("storage", ScriptedStep::Hang));
    let orch = orchestrator(&provider);
    let storage = orch.module_id("storage").await.unwrap();

    let start = Instant::now();
    orch.run_one(storage).await.unwrap();
    orch.wait_until_idle().await;

    // single-run work plus the scan timeout
    assert!(start.elapsed() >= secs(33.0));
    let module = orch.module(storage).await.unwrap();
    assert_eq!(module.status(), ModuleStatus::Critical);
    assert!(!module.is_running());

    let newest = &orch.snapshot().await.activity[0];
    assert_eq!(newest.title, "Storage Analysis scan failed");
    assert!(newest.subtitle.starts_with("Command timed out"));
}

// ============================================================================
// Report
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_report_lists_every_module() {
    let orch = DiagnosticsOrchestrator::with_mock(&seeded_config());
    orch.run_all().await;
    orch.wait_until_idle().await;

    let snap = orch.snapshot().await;
    let report = render_report(None, &snap, chrono::Utc::now());
    for module in &snap.modules {
        assert!(report.contains(&module.name), "missing {}", module.name);
    }
    assert!(report.contains("Full diagnostic complete"));
}
