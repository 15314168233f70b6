//! Google Gemini provider implementation.
//!
//! Gemini streams `GenerateContentResponse` chunks over SSE.  Each chunk's parts become the
//! blocks of one fragment; parts flagged `thought` are reasoning.

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
use crate::sse::process_sse;
use crate::turn::{Role, Turn};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Gemini service implementation.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: ReqwestClient,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    thinking_budget: u32,
}

impl GeminiProvider {
    /// Creates a provider from the resolved configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.google_api_key.clone().ok_or_else(|| {
            Error::authentication("API key not provided and GOOGLE_API_KEY not set")
        })?;
        Ok(Self {
            client: http_client()?,
            api_key,
            base_url: base_url(config, DEFAULT_API_URL),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            thinking_budget: config.thinking_budget,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| Error::authentication("API key contains invalid characters"))?,
        );
        Ok(headers)
    }

    fn translate_request<'a>(&self, turn: &'a Turn) -> GeminiRequest<'a> {
        let contents = turn
            .exchange()
            .map(|(role, text)| GeminiContent {
                role: match role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![GeminiTextPart { text }],
            })
            .collect();
        let thinking_config = (self.thinking_budget > 0).then_some(GeminiThinkingConfig {
            include_thoughts: true,
            thinking_budget: self.thinking_budget,
        });
        GeminiRequest {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                max_output_tokens: self.max_tokens,
                thinking_config,
            },
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, turn: &Turn) -> Result<FragmentStream> {
        let response = self
            .client
            .post(self.url())
            .headers(self.headers()?)
            .json(&self.translate_request(turn))
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let events = process_sse(response.bytes_stream());
        Ok(Box::pin(events.filter_map(|event| async move {
            match event {
                Ok(event) => fragment_from_chunk(&event.data),
                Err(err) => Some(Err(err)),
            }
        })))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiTextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiTextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig {
    include_thoughts: bool,
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

/// Maps one streamed chunk onto a fragment.
///
/// Only the first candidate is read.  Chunks without parts carry nothing to render.
fn fragment_from_chunk(data: &str) -> Option<Result<RawFragment>> {
    let chunk = match serde_json::from_str::<GeminiChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(e.into())),
    };
    if let Some(error) = chunk.error {
        return Some(Err(Error::api(
            error.code.unwrap_or(500),
            error.status,
            error.message.unwrap_or_else(|| data.to_string()),
            None,
        )));
    }
    let parts = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();
    if parts.is_empty() {
        return None;
    }
    Some(Ok(RawFragment::blocks(parts.into_iter().map(block_from_part))))
}

fn block_from_part(part: Value) -> ContentBlock {
    let thought = part.get("thought").and_then(Value::as_bool) == Some(true);
    match part.get("text").and_then(Value::as_str) {
        Some(text) if thought => ContentBlock::reasoning(text),
        Some(text) => ContentBlock::answer(text),
        None => ContentBlock::unrecognized(part),
    }
}
