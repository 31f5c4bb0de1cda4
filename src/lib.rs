//! Chatline: a session-scoped chat widget core that serializes user messages
//! against a remote reply service and reveals multi-part replies at a human
//! typing pace.

pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod markdown;
pub mod session;

pub use conversation::{Message, Origin};
pub use dispatch::{DispatchEngine, EngineEvent, Submission, SubmissionId};
pub use error::{Error, Result};
pub use gateway::{GatewayClient, ReplyGateway};
pub use session::Session;

use std::sync::Arc;

/// Browsing-session identifier type.
///
/// Opaque, immutable for the lifetime of the session, and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
