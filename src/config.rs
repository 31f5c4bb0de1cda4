//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Reply text the reference widget greets every new session with.
pub const DEFAULT_WELCOME: &str = "Hi! Welcome to R & S Flooring. How can we help you today?";

/// Substituted when the reply service answers with no usable segments.
pub const DEFAULT_EMPTY_REPLY_FALLBACK: &str =
    "Thank you for contacting R & S Flooring. How can we help you today?";

/// Substituted when the exchange with the reply service fails outright.
pub const DEFAULT_FAILURE_FALLBACK: &str = "I apologize for the inconvenience. Please contact us directly at (615)-285-6193 for immediate assistance.";

pub const DEFAULT_TYPING_STATUS: &str = "Support agent is typing...";

/// Literal two-character sequence (backslash, `k`) separating reply turns.
pub const DEFAULT_REPLY_DELIMITER: &str = r"\k";

/// Chatline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reply service connection settings.
    pub gateway: GatewayConfig,

    /// Reveal protocol timings.
    pub pacing: PacingConfig,

    /// Canned texts shown to the user.
    pub content: ContentConfig,

    /// Session storage key layout.
    pub storage: StorageConfig,

    /// Shortcut questions a front end may offer; submitted like typed input.
    pub quick_questions: Vec<String>,
}

/// Reply service connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// POST endpoint of the reply service.
    pub endpoint: Option<String>,

    /// Upper bound for one exchange. A hanging call becomes a failure.
    pub timeout_secs: u64,

    /// Separator between logical reply turns inside one `reply` string.
    pub delimiter: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 20,
            delimiter: DEFAULT_REPLY_DELIMITER.into(),
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reveal protocol timings, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Typing indicator hold before every segment after the first.
    pub typing_hold_ms: u64,

    /// Gap after a revealed segment when more segments follow.
    pub segment_gap_ms: u64,

    /// Pause between finishing one dispatch and starting the next queued one.
    pub turn_cooldown_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            typing_hold_ms: 1000,
            segment_gap_ms: 200,
            turn_cooldown_ms: 2000,
        }
    }
}

impl PacingConfig {
    pub fn typing_hold(&self) -> Duration {
        Duration::from_millis(self.typing_hold_ms)
    }

    pub fn segment_gap(&self) -> Duration {
        Duration::from_millis(self.segment_gap_ms)
    }

    pub fn turn_cooldown(&self) -> Duration {
        Duration::from_millis(self.turn_cooldown_ms)
    }
}

/// Canned texts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub welcome: String,
    pub empty_reply_fallback: String,
    pub failure_fallback: String,
    pub typing_status: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            welcome: DEFAULT_WELCOME.into(),
            empty_reply_fallback: DEFAULT_EMPTY_REPLY_FALLBACK.into(),
            failure_fallback: DEFAULT_FAILURE_FALLBACK.into(),
            typing_status: DEFAULT_TYPING_STATUS.into(),
        }
    }
}

/// Session storage key layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key holding the session identifier.
    pub identity_key: String,

    /// Prefix of the per-session conversation log key.
    pub log_key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            identity_key: "chat_user_id".into(),
            log_key_prefix: "chat_messages_".into(),
        }
    }
}

impl Config {
    /// Load configuration from defaults and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file, then apply environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(error),
        })?;

        let mut config = Self::from_toml(&content).map_err(|error| match error {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml(content: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(content).map_err(|error| ConfigError::Parse {
            path: "<inline>".into(),
            message: error.to_string(),
        })
    }

    /// Default config file location, if a platform config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatline").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Ok(endpoint) = std::env::var("CHATLINE_GATEWAY_URL") {
            self.gateway.endpoint = Some(endpoint);
        }

        if let Ok(value) = std::env::var("CHATLINE_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = value.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "CHATLINE_GATEWAY_TIMEOUT_SECS must be a whole number of seconds, got {value:?}"
                ))
            })?;
        }

        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.gateway.delimiter.is_empty() {
            return Err(ConfigError::Invalid(
                "gateway.delimiter must not be empty".into(),
            ));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "gateway.timeout_secs must be at least 1".into(),
            ));
        }
        if self.storage.identity_key.is_empty() || self.storage.log_key_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "storage keys must not be empty".into(),
            ));
        }
        Ok(())
    }
}
