//! Chat transcript messages.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "you"),
            Self::Assistant => write!(f, "ispy"),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(content: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            origin,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, Origin::User)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, Origin::Assistant)
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    /// Local wall-clock label (HH:MM)
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}
