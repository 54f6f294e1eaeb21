//! Anthropic proposal client
//!
//! Implements [`ProposalPort`] on top of the Anthropic messages API.
//!
//! ## Configuration
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ANTHROPIC_API_KEY` | required |
//! | `ROASTER_MODEL` | `claude-sonnet-4-20250514` |
//! | `ROASTER_API_URL` | `https://api.anthropic.com/v1/messages` |
//! | `ROASTER_MAX_TOKENS` | `2048` |
//!
//! A `.env` file is honoured. Each call is a single attempt; the agent loop
//! decides whether to ask again.

use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::sync::Arc;

use super::prompt;
use super::proposal::{NullProposer, ProposalPort, ProposalRequest};
use crate::api::logs::{log_info, log_warning};
use crate::error::{ProposalError, ProposalResult};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Anthropic API client
#[derive(Clone)]
pub struct AnthropicProposer {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

/// Anthropic API response structure
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicProposer {
    /// Create a new client with explicit API key
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create a client from the environment
    pub fn from_env() -> ProposalResult<Self> {
        let _ = dotenvy::dotenv();

        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProposalError::MissingApiKey)?;

        let mut client = Self::new(api_key);
        if let Ok(model) = env::var("ROASTER_MODEL") {
            client = client.with_model(&model);
        }
        if let Ok(url) = env::var("ROASTER_API_URL") {
            client = client.with_api_url(&url);
        }
        if let Some(max_tokens) = env::var("ROASTER_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            client = client.with_max_tokens(max_tokens);
        }
        Ok(client)
    }

    /// Set the model to use
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set the messages endpoint
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the messages API once
    async fn call_api(&self, request: &ProposalRequest) -> ProposalResult<String> {
        log_info(format!(
            "Calling {} with {} issues and {} sample records",
            self.model,
            request.issues.len(),
            request.sample.len()
        ));

        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0,
            "system": prompt::system_prompt(),
            "messages": prompt::build_messages(request)
        });

        let response = self
            .http
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProposalError::Timeout
                } else {
                    ProposalError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProposalError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(ProposalError::ApiError(error.error.message));
            }
            return Err(ProposalError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        parse_response_text(&body)
    }
}

#[async_trait]
impl ProposalPort for AnthropicProposer {
    async fn propose(&self, request: &ProposalRequest) -> ProposalResult<String> {
        self.call_api(request).await
    }
}

/// Concatenate the text blocks of a messages API response body.
///
/// An empty text is returned as-is; only an undecodable envelope is an error.
fn parse_response_text(body: &str) -> ProposalResult<String> {
    let response: AnthropicResponse =
        serde_json::from_str(body).map_err(|e| ProposalError::InvalidResponse(e.to_string()))?;

    Ok(response
        .content
        .iter()
        .filter(|c| c.content_type == "text")
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(""))
}

/// The configured proposal service, or [`NullProposer`] when there is none
pub fn proposer_from_env() -> Arc<dyn ProposalPort> {
    match AnthropicProposer::from_env() {
        Ok(client) => {
            log_info(format!("Proposal service: Anthropic ({})", client.model()));
            Arc::new(client)
        }
        Err(e) => {
            log_warning(format!("Proposal service disabled: {}", e));
            Arc::new(NullProposer)
        }
    }
}
