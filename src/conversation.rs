//! Conversation messages and their session-scoped persistence.

pub mod history;

pub use history::ConversationStore;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    #[serde(alias = "bot")]
    Agent,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::User => write!(f, "user"),
            Origin::Agent => write!(f, "agent"),
        }
    }
}

/// One chat bubble. Immutable once created; ordering is insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "type")]
    pub origin: Origin,
    pub text: String,
    /// Serialized as an RFC 3339 / ISO-8601 string.
    #[serde(alias = "timestamp")]
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Origin::User, text)
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Origin::Agent, text)
    }

    fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    /// `HH:MM` in local time, as shown next to each bubble.
    pub fn time_label(&self) -> String {
        self.sent_at.with_timezone(&Local).format("%H:%M").to_string()
    }
}
