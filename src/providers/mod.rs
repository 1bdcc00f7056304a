/*!
 * Provider implementations for different text-completion services.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API integration (also used for LM Studio)
 * - Anthropic: Anthropic API integration
 * - Mock: Scripted provider for tests and dry runs
 */

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{CompletionConfig, LlmProvider};
use crate::errors::ProviderError;

/// What shape the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Json,
    Text,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Json => "json",
            ResponseKind::Text => "text",
        }
    }
}

/// One opaque prompt sent to a text-completion service
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Full prompt text
    pub prompt: String,
    /// Declared response kind
    pub kind: ResponseKind,
    /// Short label used in logs and cache keys (e.g. "translate_faithfulness")
    pub title: String,
}

impl CompletionRequest {
    pub fn json(prompt: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: ResponseKind::Json,
            title: title.into(),
        }
    }

    pub fn text(prompt: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: ResponseKind::Text,
            title: title.into(),
        }
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably behind an `Arc<dyn CompletionProvider>`.
#[async_trait]
pub trait CompletionProvider: Send + Sync + Debug {
    /// Complete a request and return the raw response text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Human readable provider name
    fn name(&self) -> &str;
}

/// Build the configured provider
pub fn create_provider(config: &CompletionConfig) -> Arc<dyn CompletionProvider> {
    let active = config.active_provider();
    let temperature = config.common.temperature;
    let timeout = Duration::from_secs(active.timeout_secs);
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::LMStudio => Arc::new(
            openai::OpenAi::new(active.api_key, active.endpoint, active.model, timeout)
                .with_temperature(temperature)
                .with_json_mode(active.supports_json),
        ),
        LlmProvider::Anthropic => Arc::new(
            anthropic::Anthropic::new(active.api_key, active.endpoint, active.model, timeout)
                .with_max_tokens(active.max_tokens)
                .with_temperature(temperature),
        ),
        LlmProvider::Ollama => Arc::new(
            ollama::Ollama::new(&active.endpoint, active.model, timeout)
                .with_temperature(temperature)
                .with_json_format(active.supports_json),
        ),
    }
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn error_for_status(
    status: StatusCode,
    body: String,
    retry_after_secs: Option<u64>,
) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded {
            message: body,
            retry_after_secs,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(body),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        },
    }
}

/// Read a `retry-after` header expressed in seconds
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Convert a transport error, keeping timeouts distinguishable
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout.as_secs())
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
