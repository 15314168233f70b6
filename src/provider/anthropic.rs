//! Anthropic Messages API with extended thinking.
//!
//! Thinking arrives as `thinking_delta` content-block deltas and the answer as `text_delta`
//! deltas.  Each delta becomes a one-block fragment.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as ReqwestClient;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FragmentStream, Provider, base_url, error_from_response, http_client, request_error};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fragment::{ContentBlock, RawFragment};
use crate::sse::{SseEvent, process_sse};
use crate::turn::{Role, Turn};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Provider for the Anthropic API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    model: String,
    max_tokens: u32,
    thinking_budget: u32,
}

impl AnthropicProvider {
    /// Creates a provider from the resolved configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
            Error::authentication("API key not provided and ANTHROPIC_API_KEY not set")
        })?;
        Ok(Self {
            api_key,
            client: http_client()?,
            base_url: base_url(config, DEFAULT_API_URL),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            thinking_budget: config.thinking_budget,
        })
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| Error::authentication("API key contains invalid characters"))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_API_VERSION),
        );
        Ok(headers)
    }

    fn request_body<'a>(&'a self, turn: &'a Turn) -> MessagesRequest<'a> {
        let messages = turn
            .exchange()
            .map(|(role, content)| WireMessage {
                role: match role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content,
            })
            .collect();
        let thinking = (self.thinking_budget > 0).then_some(ThinkingParam::Enabled {
            budget_tokens: self.thinking_budget,
        });
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            stream: true,
            thinking,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, turn: &Turn) -> Result<FragmentStream> {
        let url = format!("{}messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.default_headers()?)
            .json(&self.request_body(turn))
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let events = process_sse(response.bytes_stream());
        Ok(Box::pin(events.filter_map(|event| async move {
            match event {
                Ok(event) => fragment_from_event(&event),
                Err(err) => Some(Err(err)),
            }
        })))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingParam>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ThinkingParam {
    Enabled { budget_tokens: u32 },
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    delta: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: StreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

/// Maps one SSE event onto a fragment.
///
/// Bookkeeping events (`ping`, `message_*`, block start and stop) carry no text and map to
/// `None`, as do event types this module does not know.
fn fragment_from_event(event: &SseEvent) -> Option<Result<RawFragment>> {
    match event.event.as_deref() {
        Some("content_block_delta") => {
            let parsed = match serde_json::from_str::<ContentBlockDeltaEvent>(&event.data) {
                Ok(parsed) => parsed,
                Err(e) => return Some(Err(e.into())),
            };
            let block = match serde_json::from_value::<Delta>(parsed.delta.clone()) {
                Ok(Delta::ThinkingDelta { thinking }) => ContentBlock::reasoning(thinking),
                Ok(Delta::TextDelta { text }) => ContentBlock::answer(text),
                Err(_) => ContentBlock::unrecognized(parsed.delta),
            };
            Some(Ok(RawFragment::blocks([block])))
        }
        Some("error") => {
            let err = match serde_json::from_str::<ErrorEvent>(&event.data) {
                Ok(ErrorEvent { error }) => Error::api(
                    500,
                    error.error_type,
                    error.message.unwrap_or_else(|| event.data.clone()),
                    None,
                ),
                Err(_) => Error::api(500, Some("stream_error".to_string()), &event.data, None),
            };
            Some(Err(err))
        }
        _ => None,
    }
}
