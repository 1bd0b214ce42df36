//! Gemini `generateContent` client.
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: <key>
//!
//! { "contents": [ {"role": "user",  "parts": [{"text": "..."}]},
//!                 {"role": "model", "parts": [{"text": "..."}]},
//!                 ...,
//!                 {"role": "user",  "parts": [{"text": "<prompt>"}]} ],
//!   "generationConfig": { "temperature": 0.4, "maxOutputTokens": 1024 } }
//! ```
//!
//! The reply is the concatenated text parts of the first candidate.

use super::{ChatBackend, LlmError};
use crate::config::Config;
use crate::error::AppResult;
use docent_core::{Message, Role};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Optional sampling parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn new(role: Role, text: &'a str) -> Self {
        let role = match role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        Self {
            role,
            parts: [TextPart { text }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(LlmError::EmptyResponse);
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return Ok(text);
        }
        match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(LlmError::Blocked(reason.to_string()))
            }
            _ => Err(LlmError::EmptyResponse),
        }
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> LlmError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => LlmError::Api {
            code: envelope.error.code,
            status: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => LlmError::Api {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or("unknown").to_string(),
            message: String::from_utf8_lossy(body).chars().take(512).collect(),
        },
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// Create a client for `model` at `base_url`, authenticating with `api_key`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(api_key)
            .map_err(|e| LlmError::Unavailable(format!("invalid API key header: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, value);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            generation: GenerationConfig::default(),
        })
    }

    /// Build a client from resolved configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = Self::new(
            config.base_url.clone(),
            config.model.clone(),
            config.require_api_key()?,
            config.timeout,
        )?
        .with_generation(GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        });
        Ok(client)
    }

    /// Set sampling parameters.
    #[must_use]
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl ChatBackend for GeminiClient {
    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn generate(&self, history: &[Message], prompt: &str) -> Result<String, LlmError> {
        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|m| Content::new(m.role, &m.content))
            .collect();
        contents.push(Content::new(Role::User, prompt));

        let request = GenerateRequest {
            contents,
            generation_config: (!self.generation.is_empty()).then_some(self.generation),
        };

        debug!(model = %self.model, history = history.len(), "calling generateContent");
        let response = self.http.post(self.endpoint()).json(&request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let parsed: GenerateResponse =
            serde_json::from_slice(&body).map_err(|e| LlmError::Malformed(e.to_string()))?;
        parsed.into_text()
    }
}

// =============================================================================
// TESTS
// =============================================================================
