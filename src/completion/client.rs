use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::cache::ResponseCache;
use super::json::parse_response;
use super::rate_limit::RateLimiterContext;
use super::retry::RetryPolicy;
use crate::app_config::CompletionConfig;
use crate::errors::{CompletionError, ProviderError, ValidationError};
use crate::providers::{CompletionProvider, CompletionRequest};

/// Why the last attempt of a call failed
enum AttemptFailure {
    Provider(ProviderError),
    Validation(ValidationError),
}

/// Validated access to the text-completion service
///
/// Every call waits on the shared rate limiter, runs under a timeout and is
/// retried with a perturbed prompt until its validator accepts the answer or
/// the retry policy is spent.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    limiter: Arc<RateLimiterContext>,
    policy: RetryPolicy,
    cache: ResponseCache,
    timeout: Duration,
    max_rate_limit_waits: usize,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, limiter: Arc<RateLimiterContext>) -> Self {
        Self {
            provider,
            limiter,
            policy: RetryPolicy::default(),
            cache: ResponseCache::new(true),
            timeout: Duration::from_secs(300),
            max_rate_limit_waits: 10,
        }
    }

    /// Build a client from the completion section of the config
    pub fn from_config(
        config: &CompletionConfig,
        provider: Arc<dyn CompletionProvider>,
        limiter: Arc<RateLimiterContext>,
    ) -> Self {
        let active = config.active_provider();
        Self::new(provider, limiter)
            .with_policy(RetryPolicy::from_config(&config.common))
            .with_cache(ResponseCache::new(config.common.response_cache))
            .with_timeout(Duration::from_secs(active.timeout_secs))
            .with_rate_limit_waits(config.common.max_rate_limit_waits as usize)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit_waits(mut self, waits: usize) -> Self {
        self.max_rate_limit_waits = waits;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiterContext> {
        &self.limiter
    }

    /// Ask for a JSON answer of type `T` accepted by `validate`
    pub async fn ask_json<T, F>(&self, request: CompletionRequest, validate: F) -> Result<T, CompletionError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Result<(), ValidationError>,
    {
        self.ask_with(request, |raw| {
            let parsed = parse_response::<T>(raw)?;
            validate(&parsed)?;
            Ok(parsed)
        })
        .await
    }

    /// Ask for a plain-text answer accepted by `validate`
    pub async fn ask_text<F>(&self, request: CompletionRequest, validate: F) -> Result<String, CompletionError>
    where
        F: Fn(&str) -> Result<(), ValidationError>,
    {
        self.ask_with(request, |raw| {
            let text = raw.trim();
            if text.is_empty() {
                return Err(ValidationError::Empty);
            }
            validate(text)?;
            Ok(text.to_string())
        })
        .await
    }

    async fn ask_with<T, P>(&self, request: CompletionRequest, accept: P) -> Result<T, CompletionError>
    where
        P: Fn(&str) -> Result<T, ValidationError>,
    {
        let cache_key = ResponseCache::key(&request);
        if let Some(cached) = self.cache.get(&cache_key) {
            match accept(&cached) {
                Ok(value) => {
                    debug!("'{}' answered from cache", request.title);
                    return Ok(value);
                }
                Err(e) => debug!("Cached answer for '{}' rejected: {}", request.title, e),
            }
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_failure = AttemptFailure::Validation(ValidationError::Empty);

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let attempt_request = CompletionRequest {
                prompt: RetryPolicy::perturb(&request.prompt, attempt),
                kind: request.kind,
                title: request.title.clone(),
            };

            let raw = match self.call_provider(&attempt_request).await {
                Ok(raw) => raw,
                Err(CompletionError::Provider(e)) => {
                    warn!(
                        "'{}' attempt {}/{} failed: {}",
                        request.title,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_failure = AttemptFailure::Provider(e);
                    continue;
                }
                Err(other) => {
                    error!("'{}' gave up: {}", request.title, other);
                    return Err(other);
                }
            };

            match accept(&raw) {
                Ok(value) => {
                    self.cache.store(&cache_key, &raw);
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "'{}' attempt {}/{} rejected: {}",
                        request.title,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_failure = AttemptFailure::Validation(e);
                }
            }
        }

        let error = match last_failure {
            AttemptFailure::Provider(e) => CompletionError::Provider(e),
            AttemptFailure::Validation(last) => CompletionError::ValidationExhausted {
                title: request.title.clone(),
                attempts: max_attempts,
                last,
            },
        };
        error!("'{}' failed: {}", request.title, error);
        Err(error)
    }

    /// One logical call; rate-limit answers are absorbed here
    async fn call_provider(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut waits = 0usize;
        loop {
            self.limiter.wait_if_needed().await;

            let outcome = tokio::time::timeout(self.timeout, self.provider.complete(request)).await;
            match outcome {
                Err(_) => return Err(ProviderError::Timeout(self.timeout.as_secs()).into()),
                Ok(Ok(text)) => {
                    self.limiter.record_success();
                    return Ok(text);
                }
                Ok(Err(e)) if e.is_rate_limited() => {
                    self.limiter.record_rate_limited();
                    waits += 1;
                    if waits > self.max_rate_limit_waits {
                        return Err(CompletionError::RateLimitBudgetExhausted {
                            title: request.title.clone(),
                            waits: self.max_rate_limit_waits,
                        });
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}
