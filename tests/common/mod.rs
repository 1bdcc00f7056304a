/*!
 * Common test utilities for the dubsync test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use dubsync::completion::{CompletionClient, RateLimiterContext, RetryPolicy};
use dubsync::providers::mock::MockProvider;

pub mod mock_providers;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Two speakers, three sentences, word-level timing
pub const SAMPLE_TRANSCRIPT: &str = r#"{
  "segments": [
    {
      "start": 0.0, "end": 3.0, "text": "Hello world. This is a test.", "speaker": "A",
      "words": [
        {"word": "Hello", "start": 0.0, "end": 0.5},
        {"word": "world.", "start": 0.5, "end": 1.0},
        {"word": "This", "start": 1.2, "end": 1.5},
        {"word": "is", "start": 1.5, "end": 1.7},
        {"word": "a", "start": 1.7, "end": 1.8},
        {"word": "test.", "start": 1.8, "end": 3.0}
      ]
    },
    {
      "start": 4.0, "end": 7.0, "text": "Nice to meet you.", "speaker": "B",
      "words": [
        {"word": "Nice", "start": 4.0, "end": 4.5},
        {"word": "to", "start": 4.5, "end": 4.7},
        {"word": "meet", "start": 4.7, "end": 5.0},
        {"word": "you.", "start": 5.0, "end": 7.0}
      ]
    }
  ]
}"#;

/// Writes the sample transcript into `dir`
pub fn create_test_transcript(dir: &Path) -> Result<PathBuf> {
    create_test_file(dir, "transcript.json", SAMPLE_TRANSCRIPT)
}

/// Client with millisecond rate-limit cooldowns and immediate retries
pub fn test_client(provider: MockProvider, attempts: usize) -> CompletionClient {
    let limiter = Arc::new(RateLimiterContext::with_limits(
        Duration::from_millis(5),
        Duration::from_millis(20),
        Duration::from_millis(1),
        3,
    ));
    CompletionClient::new(Arc::new(provider), limiter).with_policy(RetryPolicy::immediate(attempts))
}

/// Route log output to the test harness when RUST_LOG is set
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
