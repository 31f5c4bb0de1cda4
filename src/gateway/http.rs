//! HTTP transport for the reply service.
//!
//! Wire contract: `POST {endpoint}` with JSON `{"user_id", "message"}`,
//! answered by JSON `{"reply": string}`.

use crate::SessionId;
use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayError};
use crate::gateway::ReplyGateway;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest error body excerpt kept in a `GatewayError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// reqwest-backed [`ReplyGateway`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    user_id: &'a str,
    message: &'a str,
}

/// A missing or null `reply` is an empty reply; any other shape is a decode failure.
#[derive(Debug, Deserialize)]
struct ReplyResponse {
    #[serde(default)]
    reply: Option<String>,
}

impl HttpGateway {
    /// Build from config. The endpoint is required here, not at config load,
    /// so offline tooling can still read a config without one.
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey("gateway.endpoint".into()))?;
        Self::with_endpoint(endpoint, config.timeout())
    }

    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|error| {
            ConfigError::Invalid(format!("gateway.endpoint {endpoint:?} is not a URL: {error}"))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "gateway.endpoint must be http or https, got {}",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ConfigError::Invalid(format!("failed to build HTTP client: {error}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

impl ReplyGateway for HttpGateway {
    async fn exchange(&self, session_id: &SessionId, text: &str) -> Result<String, GatewayError> {
        let request = ReplyRequest {
            user_id: session_id.as_str(),
            message: text,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        let parsed: ReplyResponse =
            serde_json::from_str(&body).map_err(|error| GatewayError::Decode(error.to_string()))?;

        tracing::debug!(%session_id, bytes = body.len(), "reply service answered");
        Ok(parsed.reply.unwrap_or_default())
    }
}
