//! Fragment sources.
//!
//! A [`Provider`] turns one [`Turn`] into a stream of [`RawFragment`]s.  Each integration maps
//! its own wire format onto the shared fragment shapes, so a single classifier serves all of
//! them.  The provider is picked once at startup by [`from_config`].

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;

use crate::config::{Config, ProviderKind};
use crate::error::{Error, Result};
use crate::fragment::RawFragment;
use crate::observability::{PROVIDER_ERRORS, PROVIDER_REQUEST_DURATION, PROVIDER_REQUESTS};
use crate::turn::Turn;

mod anthropic;
mod gemini;
mod replay;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use replay::ReplayProvider;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(600);

/// The fragments of one streamed response, in send order.
///
/// The stream ends when the response is complete.  An `Err` item means the provider failed and
/// the rest of the turn is abandoned.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<RawFragment>> + Send>>;

/// A source of streamed model responses.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Starts streaming the response to `turn`.
    async fn send(&self, turn: &Turn) -> Result<FragmentStream>;
}

/// Builds the provider named by `config`.
pub fn from_config(config: &Config) -> Result<Box<dyn Provider>> {
    let inner: Box<dyn Provider> = match config.provider {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(config)?),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(config)?),
        ProviderKind::Replay => {
            let Some(path) = &config.replay_path else {
                return Err(Error::configuration(
                    "the replay provider requires a script",
                    Some("THINKSTREAM_REPLAY".to_string()),
                ));
            };
            Box::new(ReplayProvider::from_path(path).with_delay(config.replay_delay))
        }
    };
    Ok(Box::new(LoggingProvider::new(inner)))
}

/// Logging wrapper for providers.
pub struct LoggingProvider {
    inner: Box<dyn Provider>,
    name: Arc<str>,
}

impl LoggingProvider {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn Provider>) -> Self {
        let name = Arc::from(inner.name());
        Self { inner, name }
    }
}

#[async_trait]
impl Provider for LoggingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, turn: &Turn) -> Result<FragmentStream> {
        let start = Instant::now();
        PROVIDER_REQUESTS.click();
        tracing::debug!(
            provider = %self.name,
            thread_id = %turn.thread_id,
            history = turn.history.len(),
            "opening response stream"
        );
        let result = self.inner.send(turn).await;
        let duration = start.elapsed();
        PROVIDER_REQUEST_DURATION.add(duration.as_secs_f64());

        match result {
            Ok(stream) => {
                tracing::info!(
                    provider = %self.name,
                    duration_ms = %duration.as_millis(),
                    "response stream opened"
                );
                let name = Arc::clone(&self.name);
                Ok(Box::pin(stream.inspect(move |item| {
                    if let Err(err) = item {
                        PROVIDER_ERRORS.click();
                        tracing::error!(provider = %name, error = %err, "response stream failed");
                    }
                })))
            }
            Err(err) => {
                PROVIDER_ERRORS.click();
                tracing::error!(
                    provider = %self.name,
                    duration_ms = %duration.as_millis(),
                    error = %err,
                    "request failed"
                );
                Err(err)
            }
        }
    }
}

/// Builds the HTTP client shared by the network providers.
fn http_client() -> Result<ReqwestClient> {
    ReqwestClient::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(RESPONSE_TIMEOUT)
        .build()
        .map_err(|e| {
            Error::connection(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })
}

/// Normalizes a base URL so that paths can be appended.
fn base_url(config: &Config, default: &str) -> String {
    let base = config.base_url.as_deref().unwrap_or(default);
    format!("{}/", base.trim_end_matches('/'))
}

/// Maps a failed send onto the error taxonomy.
fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(format!("Request timed out: {e}"))
    } else {
        Error::connection(format!("Request failed: {e}"), Some(Box::new(e)))
    }
}

/// Process API response errors and convert to our Error type.
///
/// Understands both `{"error": {"type", "message"}}` and `{"error": {"code", "status",
/// "message"}}` bodies and falls back to the raw body text.
async fn error_from_response(response: Response) -> Error {
    let status_code = response.status().as_u16();

    let request_id = response
        .headers()
        .get("request-id")
        .or_else(|| response.headers().get("x-request-id"))
        .and_then(|val| val.to_str().ok())
        .map(String::from);

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok());

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::streaming(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            );
        }
    };
    let detail = ErrorDetail::parse(&body);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or(body);
    let error_type = detail.and_then(|d| d.error_type.or(d.status));

    match status_code {
        401 | 403 => Error::authentication(message),
        408 | 504 => Error::timeout(message),
        429 => Error::rate_limit(message, retry_after),
        _ => Error::api(status_code, error_type, message, request_id),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    status: Option<String>,
    message: Option<String>,
}

impl ErrorDetail {
    fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<ErrorResponse>(body).ok()?.error
    }
}
