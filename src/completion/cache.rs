/*!
 * Response caching for completion calls.
 *
 * Validated responses are kept in memory and, when a backing store is
 * attached, persisted so a resumed run does not pay for the same prompt twice.
 */

use log::{debug, warn};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::providers::CompletionRequest;

/// Durable storage for cached responses
pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn save(&self, key: &str, response: &str) -> anyhow::Result<()>;
}

/// Cache of validated raw responses keyed by request hash
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    store: Option<Arc<dyn CacheStore>>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
    enabled: bool,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResponseCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            store: None,
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            enabled,
        }
    }

    /// Attach a durable store consulted on memory misses
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stable key over prompt, response kind and title
    pub fn key(request: &CompletionRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.kind.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(request.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.prompt.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        if let Some(hit) = self.entries.read().get(key).cloned() {
            *self.hits.write() += 1;
            return Some(hit);
        }

        if let Some(store) = &self.store {
            match store.load(key) {
                Ok(Some(hit)) => {
                    debug!("Persistent cache hit for {}", &key[..key.len().min(12)]);
                    self.entries.write().insert(key.to_string(), hit.clone());
                    *self.hits.write() += 1;
                    return Some(hit);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read completion cache: {}", e),
            }
        }

        *self.misses.write() += 1;
        None
    }

    pub fn store(&self, key: &str, response: &str) {
        if !self.enabled {
            return;
        }
        self.entries.write().insert(key.to_string(), response.to_string());
        if let Some(store) = &self.store {
            if let Err(e) = store.save(key, response) {
                warn!("Failed to persist completion cache entry: {}", e);
            }
        }
    }

    /// Get cache statistics as (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
