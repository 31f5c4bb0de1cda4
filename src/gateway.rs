//! Reply Gateway: one request/response exchange with the remote reply service.
//!
//! [`ReplyGateway`] is the raw transport seam (HTTP in production, scripted
//! fakes in tests). [`GatewayClient`] wraps any transport with the timeout,
//! reply splitting and fallback rules, so callers always get at least one
//! segment back and never see an error.

pub mod http;

pub use http::HttpGateway;

use crate::SessionId;
use crate::config::Config;
use crate::error::GatewayError;

use std::time::Duration;

/// Transport for a single exchange with the reply service.
pub trait ReplyGateway: Send + Sync + 'static {
    /// Send `text` on behalf of `session_id` and return the raw `reply` string.
    fn exchange(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;
}

/// How a gateway round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The service answered with at least one usable segment.
    Answered,
    /// The service answered, but nothing usable; the greeting fallback was used.
    Empty,
    /// The exchange failed; the contact fallback was used.
    Failed,
}

/// Reply segments of one gateway round, in reveal order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub segments: Vec<String>,
    pub outcome: ReplyOutcome,
}

/// Applies timeout, splitting and fallbacks on top of a [`ReplyGateway`].
pub struct GatewayClient<G> {
    gateway: G,
    delimiter: String,
    timeout: Duration,
    empty_reply_fallback: String,
    failure_fallback: String,
}

impl<G: ReplyGateway> GatewayClient<G> {
    pub fn new(gateway: G, config: &Config) -> Self {
        Self {
            gateway,
            delimiter: config.gateway.delimiter.clone(),
            timeout: config.gateway.timeout(),
            empty_reply_fallback: config.content.empty_reply_fallback.clone(),
            failure_fallback: config.content.failure_fallback.clone(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run one exchange. Failures are terminal for this round and not retried.
    pub async fn send(&self, session_id: &SessionId, text: &str) -> GatewayReply {
        let exchange = self.gateway.exchange(session_id, text);
        let result = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.timeout)),
        };

        match result {
            Ok(raw) => {
                let segments = split_reply(&raw, &self.delimiter);
                if segments.is_empty() {
                    tracing::debug!(%session_id, "reply service returned no usable segments");
                    GatewayReply {
                        segments: vec![self.empty_reply_fallback.clone()],
                        outcome: ReplyOutcome::Empty,
                    }
                } else {
                    GatewayReply {
                        segments,
                        outcome: ReplyOutcome::Answered,
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, %session_id, "reply service exchange failed");
                GatewayReply {
                    segments: vec![self.failure_fallback.clone()],
                    outcome: ReplyOutcome::Failed,
                }
            }
        }
    }
}

/// Split a raw reply on the literal `delimiter`, trimming each segment and
/// dropping the blank ones.
pub fn split_reply(raw: &str, delimiter: &str) -> Vec<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}
