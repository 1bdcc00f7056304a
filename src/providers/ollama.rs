use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{CompletionProvider, CompletionRequest, ResponseKind};
use crate::errors::ProviderError;

const DEFAULT_PORT: u16 = 11434;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    model: String,
    temperature: Option<f32>,
    /// Pass `format: "json"` on JSON requests
    json_format: bool,
    timeout: Duration,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Format to return a response in
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Whether to stream the response
    stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    pub done: bool,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: None,
            format: None,
            stream: false,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.options = temperature.map(|t| GenerationOptions {
            temperature: Some(t),
        });
        self
    }

    /// Set the format
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Normalize a configured endpoint into `scheme://host:port`
///
/// Accepts bare hosts (`localhost`), hosts with ports and full URLs.
pub fn normalize_base_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else if endpoint.is_empty() {
        "http://localhost".to_string()
    } else {
        format!("http://{}", endpoint)
    };

    match Url::parse(&candidate) {
        Ok(mut url) => {
            if url.port().is_none() {
                let _ = url.set_port(Some(DEFAULT_PORT));
            }
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => format!("http://localhost:{}", DEFAULT_PORT),
    }
}

impl Ollama {
    /// Create a new Ollama client for the given endpoint
    pub fn new(endpoint: &str, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: normalize_base_url(endpoint),
            client: Client::builder()
                .timeout(timeout)
                // Ollama uses HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            model: model.into(),
            temperature: None,
            json_format: true,
            timeout,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate a completion
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| super::transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = super::retry_after(response.headers());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(super::error_for_status(status, error_text, retry_after));
        }

        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl CompletionProvider for Ollama {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut body = GenerationRequest::new(&self.model, &request.prompt).temperature(self.temperature);
        if request.kind == ResponseKind::Json && self.json_format {
            body = body.format("json");
        }
        Ok(self.generate(&body).await?.response)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| super::transport_error(e, self.timeout))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ConnectionError(format!(
                "Ollama answered {} on {}",
                response.status(),
                url
            )))
        }
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
