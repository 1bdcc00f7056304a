/*!
 * Error types for the dubsync application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not finish within its deadline
    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether this failure should be absorbed by the shared rate limiter.
    ///
    /// Besides the dedicated variant, some gateways only surface the status
    /// inside a generic message, so the text is inspected as well.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimitExceeded { .. } => true,
            ProviderError::ApiError { status_code: 429, .. } => true,
            other => {
                let text = other.to_string().to_lowercase();
                text.contains("429") || text.contains("rate_limit")
            }
        }
    }
}

/// Reasons a text-completion response was rejected by its schema validator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Response is missing ids: {0:?}")]
    MissingIds(Vec<String>),

    #[error("Response contains unexpected ids: {0:?}")]
    UnexpectedIds(Vec<String>),

    #[error("Entry {id} is missing field '{field}'")]
    MissingField { id: String, field: String },

    #[error("Entry keyed {key} reports id {found}")]
    IdMismatch { key: String, found: String },

    #[error("Split for {0} does not contain the delimiter")]
    MissingDelimiter(String),

    #[error("Expected {expected} parts, got {actual}")]
    PartCountMismatch { expected: usize, actual: usize },

    #[error("Response is empty")]
    Empty,
}

/// Errors returned by the completion client once its budgets are spent
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("'{title}' failed validation after {attempts} attempts: {last}")]
    ValidationExhausted {
        title: String,
        attempts: usize,
        last: ValidationError,
    },

    #[error("'{title}' kept hitting rate limits after {waits} waits")]
    RateLimitBudgetExhausted { title: String, waits: usize },
}

/// Errors raised while decoding or writing audio
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Failed to resample: {0}")]
    Resample(String),

    #[error("Failed to encode audio: {0}")]
    Encode(String),

    #[error("Clip is missing: {0}")]
    MissingClip(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a completion call
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Error from audio processing
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

/// A unit of work (chunk, batch, sentence) that failed and was skipped
///
/// Collected into the pipeline report instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedUnit {
    pub stage: String,
    pub ids: Vec<u64>,
    pub error: String,
}

impl FailedUnit {
    pub fn new(stage: &str, ids: Vec<u64>, error: impl ToString) -> Self {
        Self {
            stage: stage.to_string(),
            ids,
            error: error.to_string(),
        }
    }
}
