//! Diagnostics orchestrator.
//!
//! Owns the module catalog and runs simulated scans against a
//! `DiagnosticsProvider`, either one module at a time or as a staggered
//! batch over the whole catalog.
//!
//! Batch flow:
//! 1. every module goes `Pending`, module *i* is scheduled at *i* × stagger
//! 2. at its start time a module goes `Running` and the provider is called
//! 3. on completion the score is applied and an activity entry is written
//! 4. when nothing is pending or running, batch statistics are recomputed
//!
//! Invariants:
//! - each scheduled task carries a run token; it only mutates state when the
//!   module still holds that token and is in the expected phase
//! - the state lock is never held across a sleep or a provider call
//! - a provider failure ends in a terminal `critical` module, never a module
//!   that stays running

use crate::events::EventBus;
use crate::provider::{DiagnosticsProvider, MockProvider, ProviderError, ScanReading, ScanRequest};
use crate::sim::{make_rng, sample_range, STREAM_ORCHESTRATOR};
use chrono::{DateTime, Utc};
use ispy_shared::config::{IspyConfig, TimingConfig};
use ispy_shared::{
    ActivityItem, ActivityKind, ActivityLog, DiagnosticModule, IspyError, ModuleId, ModuleStatus,
    Result, ScanPhase,
};
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Summary entry severity thresholds on the mean score
const SUMMARY_SUCCESS_THRESHOLD: f64 = 80.0;
const SUMMARY_INFO_THRESHOLD: f64 = 60.0;

/// Result of `run_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAllOutcome {
    /// A new batch was scheduled
    Started,
    /// A batch was already running and has been cancelled instead
    Cancelled,
}

/// Result of `run_one`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOneOutcome {
    Started,
    /// The module is already pending or running; nothing was scheduled
    AlreadyRunning,
}

/// Observable state changes
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    BatchStarted { modules: usize },
    ModuleStarted { id: ModuleId },
    ModuleCompleted { id: ModuleId, score: f64, status: ModuleStatus },
    ModuleFailed { id: ModuleId, reason: String },
    BatchCompleted { overall_health: f64, critical_count: usize },
    Cancelled,
    SelectionChanged { id: Option<ModuleId> },
    ActivityCleared,
}

/// Read-only copy of the orchestrator state for presentation
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorSnapshot {
    pub modules: Vec<DiagnosticModule>,
    /// Newest first
    pub activity: Vec<ActivityItem>,
    pub overall_health: f64,
    pub critical_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub batch_in_progress: bool,
    /// Selected module, re-resolved from the current collection
    pub selected_module: Option<DiagnosticModule>,
}

impl OrchestratorSnapshot {
    pub fn module_by_key(&self, key: &str) -> Option<&DiagnosticModule> {
        self.modules.iter().find(|m| m.key == key)
    }

    pub fn running_count(&self) -> usize {
        self.modules.iter().filter(|m| m.is_running()).count()
    }
}

/// Which operation scheduled a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Batch,
    Single,
}

/// One scheduled batch member
#[derive(Debug, Clone)]
struct BatchStep {
    id: ModuleId,
    token: u64,
    start_delay: Duration,
    work: Duration,
}

struct Slot {
    module: DiagnosticModule,
    /// Token of the most recent run scheduled for this module
    token: u64,
}

struct OrchestratorState {
    slots: Vec<Slot>,
    activity: ActivityLog,
    overall_health: f64,
    critical_count: usize,
    last_updated: Option<DateTime<Utc>>,
    batch_in_progress: bool,
    selected: Option<ModuleId>,
    device_id: Option<String>,
    next_token: u64,
    rng: StdRng,
}

impl OrchestratorState {
    fn slot_mut(&mut self, id: ModuleId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.module.id == id)
    }

    fn mean_score(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        let total: f64 = self.slots.iter().map(|s| s.module.score()).sum();
        total / self.slots.len() as f64
    }

    fn count_critical(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.module.status() == ModuleStatus::Critical)
            .count()
    }

    fn any_busy(&self) -> bool {
        self.slots.iter().any(|s| s.module.is_busy())
    }

    fn take_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

/// Owned handle over the diagnostics state. Clones share the same state.
#[derive(Clone)]
pub struct DiagnosticsOrchestrator {
    state: Arc<RwLock<OrchestratorState>>,
    provider: Arc<dyn DiagnosticsProvider>,
    timing: TimingConfig,
    events: EventBus<OrchestratorEvent>,
}

impl DiagnosticsOrchestrator {
    /// Build over the full catalog with the given provider
    pub fn new(config: &IspyConfig, provider: Arc<dyn DiagnosticsProvider>) -> Self {
        Self::with_modules(config, provider, DiagnosticModule::catalog())
    }

    /// Build with the mock provider, seeded from the config
    pub fn with_mock(config: &IspyConfig) -> Self {
        Self::new(config, Arc::new(MockProvider::new(config.seed)))
    }

    pub fn with_modules(
        config: &IspyConfig,
        provider: Arc<dyn DiagnosticsProvider>,
        modules: Vec<DiagnosticModule>,
    ) -> Self {
        let mut activity = ActivityLog::new(config.activity.capacity);
        activity.push(ActivityItem::new(
            "Diagnostics ready",
            format!("{} modules loaded", modules.len()),
            ActivityKind::Info,
        ));

        let mut state = OrchestratorState {
            slots: modules
                .into_iter()
                .map(|module| Slot { module, token: 0 })
                .collect(),
            activity,
            overall_health: 0.0,
            critical_count: 0,
            last_updated: None,
            batch_in_progress: false,
            selected: None,
            device_id: None,
            next_token: 0,
            rng: make_rng(config.seed, STREAM_ORCHESTRATOR),
        };
        state.overall_health = state.mean_score();
        state.critical_count = state.count_critical();

        info!(
            "Orchestrator ready: {} modules, provider={}",
            state.slots.len(),
            provider.name()
        );

        Self {
            state: Arc::new(RwLock::new(state)),
            provider,
            timing: config.timing.clone(),
            events: EventBus::new(),
        }
    }

    /// Observe state changes
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Device that subsequent scans are addressed to
    pub async fn set_device(&self, device_id: Option<String>) {
        self.state.write().await.device_id = device_id;
    }

    pub async fn snapshot(&self) -> OrchestratorSnapshot {
        let state = self.state.read().await;
        let modules: Vec<DiagnosticModule> = state.slots.iter().map(|s| s.module.clone()).collect();
        let selected_module = state
            .selected
            .and_then(|id| modules.iter().find(|m| m.id == id).cloned());
        OrchestratorSnapshot {
            modules,
            activity: state.activity.to_vec(),
            overall_health: state.overall_health,
            critical_count: state.critical_count,
            last_updated: state.last_updated,
            batch_in_progress: state.batch_in_progress,
            selected_module,
        }
    }

    pub async fn module(&self, id: ModuleId) -> Option<DiagnosticModule> {
        let state = self.state.read().await;
        state
            .slots
            .iter()
            .find(|s| s.module.id == id)
            .map(|s| s.module.clone())
    }

    /// Resolve a catalog key ("battery") to the module id
    pub async fn module_id(&self, key: &str) -> Result<ModuleId> {
        let state = self.state.read().await;
        state
            .slots
            .iter()
            .find(|s| s.module.key == key)
            .map(|s| s.module.id)
            .ok_or_else(|| IspyError::UnknownModule(key.to_string()))
    }

    pub async fn is_batch_running(&self) -> bool {
        self.state.read().await.batch_in_progress
    }

    /// No batch open and no module pending or running
    pub async fn is_idle(&self) -> bool {
        let state = self.state.read().await;
        !state.batch_in_progress && !state.any_busy()
    }

    /// Select a module card, or clear the selection with `None`
    pub async fn select_module(&self, id: Option<ModuleId>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(id) = id {
            if !state.slots.iter().any(|s| s.module.id == id) {
                return Err(IspyError::UnknownModule(id.to_string()));
            }
        }
        state.selected = id;
        self.events.emit(OrchestratorEvent::SelectionChanged { id });
        Ok(())
    }

    pub async fn clear_activity(&self) {
        self.state.write().await.activity.clear();
        self.events.emit(OrchestratorEvent::ActivityCleared);
    }

    /// Start a staggered batch over every module, or cancel the batch that
    /// is already running.
    pub async fn run_all(&self) -> RunAllOutcome {
        let steps = {
            let mut state = self.state.write().await;
            if state.batch_in_progress {
                drop(state);
                info!("Batch already running, cancelling");
                self.cancel_all().await;
                return RunAllOutcome::Cancelled;
            }

            state.batch_in_progress = true;
            let stagger = self.timing.stagger_units;
            let work_range = self.timing.batch_work_units;
            let mut steps = Vec::with_capacity(state.slots.len());

            let OrchestratorState {
                slots,
                next_token,
                rng,
                ..
            } = &mut *state;
            for (index, slot) in slots.iter_mut().enumerate() {
                *next_token += 1;
                slot.token = *next_token;
                slot.module.phase = ScanPhase::Pending;
                steps.push(BatchStep {
                    id: slot.module.id,
                    token: slot.token,
                    start_delay: self.timing.duration(index as f64 * stagger),
                    work: self.timing.duration(sample_range(rng, work_range)),
                });
            }
            steps
        };

        info!("Batch started: {} modules", steps.len());
        self.events.emit(OrchestratorEvent::BatchStarted {
            modules: steps.len(),
        });

        if steps.is_empty() {
            let mut state = self.state.write().await;
            self.complete_batch(&mut state);
            return RunAllOutcome::Started;
        }

        for step in steps {
            let this = self.clone();
            tokio::spawn(async move {
                this.run_batch_step(step).await;
            });
        }

        RunAllOutcome::Started
    }

    /// Scan a single module for the fixed single-run duration.
    ///
    /// Updates overall health on completion but leaves the critical count
    /// and the last-updated stamp to batch runs.
    pub async fn run_one(&self, id: ModuleId) -> Result<RunOneOutcome> {
        let (token, request) = {
            let mut state = self.state.write().await;
            let token = state.take_token();
            let device_id = state.device_id.clone();
            let slot = state
                .slot_mut(id)
                .ok_or_else(|| IspyError::UnknownModule(id.to_string()))?;
            if slot.module.is_busy() {
                debug!("Module {} already running, ignoring run_one", slot.module.key);
                return Ok(RunOneOutcome::AlreadyRunning);
            }
            slot.token = token;
            slot.module.phase = ScanPhase::Running;
            (
                token,
                ScanRequest {
                    module_id: id,
                    module_key: slot.module.key.clone(),
                    device_id,
                    simulated_work: self.timing.single_run(),
                },
            )
        };

        info!("Single scan started: {}", request.module_key);
        self.events.emit(OrchestratorEvent::ModuleStarted { id });

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.scan(&request).await;
            this.finish_scan(id, token, result, ScanKind::Single).await;
        });

        Ok(RunOneOutcome::Started)
    }

    /// Stop every pending or running scan and close the batch.
    /// Scores are left as they are; in-flight tasks become no-ops.
    pub async fn cancel_all(&self) {
        let mut state = self.state.write().await;
        let mut stopped = 0;
        for slot in state.slots.iter_mut() {
            if slot.module.is_busy() {
                slot.module.phase = ScanPhase::Idle;
                stopped += 1;
            }
        }
        let had_batch = state.batch_in_progress;
        state.batch_in_progress = false;

        if stopped > 0 || had_batch {
            info!("Cancelled {} scans (batch open: {})", stopped, had_batch);
            self.events.emit(OrchestratorEvent::Cancelled);
        }
    }

    /// Resolve once nothing is pending or running
    pub async fn wait_until_idle(&self) {
        let mut rx = self.events.subscribe();
        loop {
            if self.is_idle().await {
                return;
            }
            match rx.recv().await {
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    async fn run_batch_step(&self, step: BatchStep) {
        tokio::time::sleep(step.start_delay).await;

        let request = {
            let mut state = self.state.write().await;
            let device_id = state.device_id.clone();
            let Some(slot) = state.slot_mut(step.id) else {
                return;
            };
            if slot.token != step.token || slot.module.phase != ScanPhase::Pending {
                debug!("Skipping stale batch start for {}", slot.module.key);
                return;
            }
            slot.module.phase = ScanPhase::Running;
            ScanRequest {
                module_id: step.id,
                module_key: slot.module.key.clone(),
                device_id,
                simulated_work: step.work,
            }
        };

        self.events.emit(OrchestratorEvent::ModuleStarted { id: step.id });
        let result = self.scan(&request).await;
        self.finish_scan(step.id, step.token, result, ScanKind::Batch)
            .await;
    }

    /// Provider call bounded by the configured scan timeout
    async fn scan(&self, request: &ScanRequest) -> std::result::Result<ScanReading, ProviderError> {
        let limit = request.simulated_work + self.timing.scan_timeout();
        match tokio::time::timeout(limit, self.provider.scan(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(limit)),
        }
    }

    async fn finish_scan(
        &self,
        id: ModuleId,
        token: u64,
        result: std::result::Result<ScanReading, ProviderError>,
        kind: ScanKind,
    ) {
        let mut state = self.state.write().await;
        let Some(slot) = state.slot_mut(id) else {
            return;
        };
        if slot.token != token || !slot.module.is_running() {
            debug!("Dropping stale result for {}", slot.module.key);
            return;
        }

        let entry = match result {
            Ok(reading) => {
                slot.module.set_score(reading.score);
                slot.module.phase = ScanPhase::Done;
                let module = &slot.module;
                info!(
                    "{} scan complete: {:.1} ({})",
                    module.key,
                    module.score(),
                    module.status().as_str()
                );
                self.events.emit(OrchestratorEvent::ModuleCompleted {
                    id,
                    score: module.score(),
                    status: module.status(),
                });
                module_entry(module)
            }
            Err(error) => {
                slot.module.set_score(0.0);
                slot.module.phase = ScanPhase::Done;
                warn!("{} scan failed: {}", slot.module.key, error);
                self.events.emit(OrchestratorEvent::ModuleFailed {
                    id,
                    reason: error.to_string(),
                });
                ActivityItem::new(
                    format!("{} scan failed", slot.module.name),
                    capitalize(&error.to_string()),
                    ActivityKind::Error,
                )
            }
        };
        state.activity.push(entry);

        if kind == ScanKind::Single {
            state.overall_health = state.mean_score();
        }

        if state.batch_in_progress && !state.any_busy() {
            self.complete_batch(&mut state);
        }
    }

    fn complete_batch(&self, state: &mut OrchestratorState) {
        let mean = state.mean_score();
        state.overall_health = mean;
        state.critical_count = state.count_critical();
        state.last_updated = Some(Utc::now());
        state.batch_in_progress = false;

        let kind = if mean >= SUMMARY_SUCCESS_THRESHOLD {
            ActivityKind::Success
        } else if mean >= SUMMARY_INFO_THRESHOLD {
            ActivityKind::Info
        } else {
            ActivityKind::Warning
        };
        let critical = state.critical_count;
        let subtitle = match critical {
            0 => format!("Overall health {:.0}% · no critical issues", mean),
            1 => format!("Overall health {:.0}% · 1 critical issue", mean),
            n => format!("Overall health {:.0}% · {} critical issues", mean, n),
        };
        state
            .activity
            .push(ActivityItem::new("Full diagnostic complete", subtitle, kind));

        info!(
            "Batch complete: overall health {:.1}, {} critical",
            mean, critical
        );
        self.events.emit(OrchestratorEvent::BatchCompleted {
            overall_health: mean,
            critical_count: critical,
        });
    }
}

fn module_entry(module: &DiagnosticModule) -> ActivityItem {
    let kind = match module.status() {
        ModuleStatus::Excellent | ModuleStatus::Good => ActivityKind::Success,
        ModuleStatus::Warning => ActivityKind::Warning,
        ModuleStatus::Critical => ActivityKind::Error,
    };
    ActivityItem::new(
        format!("{} scan complete", module.name),
        format!("Score {}% · {}", module.score_percent(), module.status()),
        kind,
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;

    fn orchestrator(provider: ScriptedProvider) -> DiagnosticsOrchestrator {
        DiagnosticsOrchestrator::new(&IspyConfig::default(), Arc::new(provider))
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("device disconnected"), "Device disconnected");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_module_entry_kind() {
        let mut module = DiagnosticModule::catalog().remove(0);
        module.set_score(45.0);
        let entry = module_entry(&module);
        assert_eq!(entry.kind, ActivityKind::Error);
        assert_eq!(entry.title, "Battery Health scan complete");
        assert_eq!(entry.subtitle, "Score 45% · Critical");
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let orch = orchestrator(ScriptedProvider::new(80.0));
        let snap = orch.snapshot().await;
        assert_eq!(snap.modules.len(), 9);
        assert_eq!(snap.activity.len(), 1);
        assert!(!snap.batch_in_progress);
        assert!(snap.last_updated.is_none());
        let mean: f64 = snap.modules.iter().map(|m| m.score()).sum::<f64>() / 9.0;
        assert!((snap.overall_health - mean).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_catalog_batch_completes_immediately() {
        let orch = DiagnosticsOrchestrator::with_modules(
            &IspyConfig::default(),
            Arc::new(ScriptedProvider::new(80.0)),
            Vec::new(),
        );
        assert_eq!(orch.run_all().await, RunAllOutcome::Started);
        assert!(orch.is_idle().await);
        assert!(orch.snapshot().await.last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_unknown_module() {
        let orch = orchestrator(ScriptedProvider::new(80.0));
        let err = orch.select_module(Some(ModuleId::new())).await.unwrap_err();
        assert!(matches!(err, IspyError::UnknownModule(_)));
    }
}
