//! Shared types for the iSpy diagnostics workspace.
//!
//! Data model for modules, activity, chat and devices, plus the
//! configuration and error types used by the engine and the CLI.

pub mod activity;
pub mod chat;
pub mod config;
pub mod device;
pub mod error;
pub mod module;

pub use activity::{ActivityItem, ActivityKind, ActivityLog, DEFAULT_ACTIVITY_CAPACITY};
pub use chat::{ChatMessage, Origin};
pub use config::IspyConfig;
pub use device::{BatteryStatus, Device, StorageStatus};
pub use error::{IspyError, Result};
pub use module::{DiagnosticModule, ModuleId, ModuleSpec, ModuleStatus, ScanPhase, CATALOG};
