//! Activity log for completed scans.
//!
//! Bounded, newest-first. Pushing past capacity drops the oldest entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Default number of entries kept
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 10;

/// Severity of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Success,
    Info,
    Warning,
    Error,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Success => "success",
            ActivityKind::Info => "info",
            ActivityKind::Warning => "warning",
            ActivityKind::Error => "error",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single activity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub kind: ActivityKind,
    pub created_at: DateTime<Utc>,
}

impl ActivityItem {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, kind: ActivityKind) -> Self {
        Self::at(title, subtitle, kind, Utc::now())
    }

    pub fn at(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        kind: ActivityKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            subtitle: subtitle.into(),
            kind,
            created_at,
        }
    }

    /// Relative timestamp label ("Just now", "5 minutes ago", ...)
    pub fn relative_label(&self, now: DateTime<Utc>) -> String {
        relative_label(now - self.created_at)
    }
}

/// Format an elapsed duration the way activity rows show it
pub fn relative_label(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (count, unit) = match secs {
        0..=59 => return "Just now".to_string(),
        60..=3599 => (secs / 60, "minute"),
        3600..=86_399 => (secs / 3600, "hour"),
        _ => (secs / 86_400, "day"),
    };
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Bounded newest-first activity log
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityItem>,
    capacity: usize,
}

impl ActivityLog {
    /// Capacity is at least 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Prepend an entry, evicting the oldest beyond capacity
    pub fn push(&mut self, item: ActivityItem) {
        self.entries.push_front(item);
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn newest(&self) -> Option<&ActivityItem> {
        self.entries.front()
    }

    /// Iterate newest-first
    pub fn iter(&self) -> impl Iterator<Item = &ActivityItem> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ActivityItem> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}
