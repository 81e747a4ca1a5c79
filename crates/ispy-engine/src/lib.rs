//! iSpy diagnostics engine.
//!
//! Owned state holders driven by simulated timers:
//! - `DiagnosticsOrchestrator`: batch and single-module scans, activity log
//! - `ChatAssistant`: keyword-matched canned replies with thinking latency
//! - `DeviceRegistry`: periodically refreshed device list
//!
//! All three are cheap `Clone` handles over shared state. Every spawned
//! timer task re-checks its run token under the state lock before mutating,
//! so cancelled work never writes.

pub mod analytics;
pub mod assistant;
pub mod events;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod report;
pub mod responses;
pub mod sim;

pub use analytics::{
    AnalyticsResult, ChartPoint, DeviceAnalytics, Metric, Reading, ThermalState, Trend,
};
pub use assistant::{AssistantEvent, ChatAssistant, SendOutcome};
pub use events::EventBus;
pub use orchestrator::{
    DiagnosticsOrchestrator, OrchestratorEvent, OrchestratorSnapshot, RunAllOutcome, RunOneOutcome,
};
pub use provider::{
    DeviceSource, DiagnosticsProvider, MockDeviceSource, MockProvider, ProviderError, ScanReading,
    ScanRequest, ScriptedProvider,
};
pub use registry::{DeviceRegistry, RegistryEvent};
pub use report::render_report;
pub use responses::{ResponseTable, Topic};
