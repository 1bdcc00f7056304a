/*!
 * Mock provider implementation for tests and offline runs.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working(responder)` - Always succeeds with the responder's text
 * - `MockProvider::intermittent(n, responder)` - Fails every Nth request
 * - `MockProvider::rate_limited(n, responder)` - Answers 429 for the first N requests
 * - `MockProvider::failing()` - Always fails with an error
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CompletionProvider, CompletionRequest};
use crate::errors::ProviderError;

/// Produces the raw response text for a request
pub type Responder = Arc<dyn Fn(&CompletionRequest) -> String + Send + Sync>;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always answers with the responder
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Answers HTTP 429 for the first `times` requests
    RateLimited { times: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing completion behavior
#[derive(Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every request received, in order
    history: Arc<Mutex<Vec<CompletionRequest>>>,
    responder: Responder,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("behavior", &self.behavior)
            .field("request_count", &self.request_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior, responder: Responder) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            history: Arc::new(Mutex::new(Vec::new())),
            responder,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        Self::new(MockBehavior::Working, Arc::new(responder))
    }

    /// Create a mock that answers the same text to every request
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::working(move |_| text.clone())
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent<F>(fail_every: usize, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        Self::new(MockBehavior::Intermittent { fail_every }, Arc::new(responder))
    }

    /// Create a mock that is rate limited for its first `times` requests
    pub fn rate_limited<F>(times: usize, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        Self::new(MockBehavior::RateLimited { times }, Arc::new(responder))
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing, Arc::new(|_| String::new()))
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty, Arc::new(|_| String::new()))
    }

    /// Create a mock that sleeps before answering
    pub fn slow<F>(delay_ms: u64, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        Self::new(MockBehavior::Slow { delay_ms }, Arc::new(responder))
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn history(&self) -> Vec<CompletionRequest> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.history.lock().push(request.clone());

        match self.behavior {
            MockBehavior::Working => Ok((self.responder)(request)),

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok((self.responder)(request))
                }
            }

            MockBehavior::RateLimited { times } => {
                if count < times {
                    Err(ProviderError::RateLimitExceeded {
                        message: "Simulated 429".to_string(),
                        retry_after_secs: None,
                    })
                } else {
                    Ok((self.responder)(request))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok((self.responder)(request))
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated outage".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
