//! Google Gemini provider implementation
//!
//! This module implements the LLMProvider trait for Gemini models through the
//! `generateContent` REST endpoint.
//! See: https://ai.google.dev/api/generate-content
//!
//! # Example
//!
//! ```no_run
//! use pulse_llm::{CompletionRequest, LLMProvider};
//! use pulse_llm::providers::GeminiProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GeminiProvider::from_env()?;
//!
//!     let request = CompletionRequest::builder("gemini-2.5-flash")
//!         .prompt("Give me a one-line market summary for AAPL")
//!         .max_tokens(256)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Result, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Gemini provider
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the API (default: "https://generativelanguage.googleapis.com/v1beta")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Point the provider at a different endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

// The key must never reach a log line.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a provider with default settings for the given key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a provider from a full configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LLMError::ConfigurationError(
                "Gemini API key must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider from environment variable
    ///
    /// Reads the API key from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.config.api_base)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to Gemini API");

        let body = GeminiRequest {
            system_instruction: request.system.as_deref().map(GeminiContent::text),
            contents: vec![GeminiContent::user(&request.prompt)],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(classify_error(status.as_u16(), &request.model, error_text));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            LLMError::Blocked(
                parsed
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates returned".to_string()),
            )
        })?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let stop_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") => {
                StopReason::Filtered
            }
            _ => StopReason::EndTurn,
        };

        if text.trim().is_empty() {
            return Err(LLMError::Blocked(format!(
                "empty response (finish reason: {})",
                candidate.finish_reason.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        debug!(
            "Received response - stop_reason: {:?}, tokens: {}/{}",
            stop_reason, usage.input_tokens, usage.output_tokens
        );

        Ok(CompletionResponse {
            text,
            stop_reason,
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Map a non-success status to an error.
///
/// Gemini reports a bad key as `400 INVALID_ARGUMENT` with reason
/// `API_KEY_INVALID` rather than 401.
fn classify_error(status: u16, model: &str, body: String) -> LLMError {
    let bad_key = body.contains("API_KEY_INVALID") || body.contains("API key not valid");
    match status {
        400 if bad_key => LLMError::AuthenticationFailed,
        401 | 403 => LLMError::AuthenticationFailed,
        429 => LLMError::RateLimitExceeded(body),
        400 => LLMError::InvalidRequest(body),
        404 => LLMError::ModelNotFound(model.to_string()),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

// Gemini-specific request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![GeminiPart {
                text: Some(text.to_string()),
            }],
        }
    }

    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            ..Self::text(text)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}
