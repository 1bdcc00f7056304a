/*!
 * Shortening of translations that cannot be spoken in their window.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use once_cell::sync::Lazy;
use regex::Regex;

use super::speech_rate::SpeechRateModel;
use super::SubtitleEntry;
use crate::app_config::TrimConfig;
use crate::completion::{CompletionClient, TrimResponse};
use crate::errors::{CompletionError, FailedUnit};
use crate::prompts::{trim_prompt, TrimItem};
use crate::providers::CompletionRequest;

static FALLBACK_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.!?;:，。！？；：]").unwrap());

/// Deterministic shortening used when the service cannot help
pub fn strip_punctuation(text: &str) -> String {
    FALLBACK_PUNCTUATION.replace_all(text, " ").trim().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct TrimOutcome {
    pub entries: Vec<SubtitleEntry>,
    /// Entries whose translation was replaced
    pub trimmed: Vec<usize>,
    /// Batches that fell back to punctuation stripping
    pub fallbacks: Vec<FailedUnit>,
}

pub struct DurationTrimmer {
    client: CompletionClient,
    config: TrimConfig,
    model: SpeechRateModel,
    target_language: String,
    max_workers: usize,
}

impl DurationTrimmer {
    pub fn new(client: CompletionClient, config: TrimConfig, target_language: impl Into<String>, max_workers: usize) -> Self {
        let model = SpeechRateModel::new(config.speech_rate);
        Self {
            client,
            config,
            model,
            target_language: target_language.into(),
            max_workers: max_workers.max(1),
        }
    }

    pub fn model(&self) -> &SpeechRateModel {
        &self.model
    }

    /// Over budget: long enough to bother and too slow even at max speed
    pub fn needs_trim(&self, entry: &SubtitleEntry) -> bool {
        entry.duration > self.config.min_trim_duration
            && self.model.estimate_duration(&entry.translation) / self.config.max_speed_factor > entry.duration
    }

    pub async fn trim(&self, mut entries: Vec<SubtitleEntry>) -> TrimOutcome {
        let over_budget: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.needs_trim(entry))
            .map(|(index, _)| index)
            .collect();
        if over_budget.is_empty() {
            debug!("No subtitle needs trimming");
            return TrimOutcome {
                entries,
                ..Default::default()
            };
        }
        info!("Trimming {} subtitles in batches of {}", over_budget.len(), self.config.batch_size);

        let entries_ref = &entries;
        let mut results = stream::iter(over_budget.chunks(self.config.batch_size.max(1)).enumerate())
            .map(|(batch_index, batch)| async move {
                (batch_index, batch, self.trim_batch(entries_ref, batch).await)
            })
            .buffer_unordered(self.max_workers)
            .collect::<Vec<_>>()
            .await;
        results.sort_by_key(|(batch_index, _, _)| *batch_index);

        let mut replacements: Vec<(usize, String)> = Vec::with_capacity(over_budget.len());
        let mut fallbacks = Vec::new();
        for (batch_index, batch, result) in results {
            match result {
                Ok(lines) => replacements.extend(lines),
                Err(e) => {
                    error!("Trim batch {} failed, stripping punctuation instead: {}", batch_index + 1, e);
                    let ids = batch.iter().map(|index| *index as u64 + 1).collect();
                    fallbacks.push(FailedUnit::new("trim_subs", ids, e));
                    replacements.extend(batch.iter().map(|index| (*index, strip_punctuation(&entries[*index].translation))));
                }
            }
        }

        let mut trimmed = Vec::with_capacity(replacements.len());
        for (index, text) in replacements {
            debug!("Trimmed line {}: \"{}\" -> \"{}\"", index + 1, entries[index].translation, text);
            entries[index].translation = text;
            trimmed.push(index);
        }
        TrimOutcome {
            entries,
            trimmed,
            fallbacks,
        }
    }

    async fn trim_batch(&self, entries: &[SubtitleEntry], batch: &[usize]) -> Result<Vec<(usize, String)>, CompletionError> {
        let items: Vec<TrimItem<'_>> = batch
            .iter()
            .map(|index| TrimItem {
                id: *index as u64 + 1,
                text: &entries[*index].translation,
                duration: entries[*index].duration,
            })
            .collect();
        let ids: Vec<u64> = items.iter().map(|item| item.id).collect();

        let response: TrimResponse = self
            .client
            .ask_json(
                CompletionRequest::json(trim_prompt(&items, &self.target_language), "trim_subs"),
                |response: &TrimResponse| response.validate(&ids),
            )
            .await?;

        Ok(batch
            .iter()
            .map(|index| {
                let text = response
                    .text(*index as u64 + 1)
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| strip_punctuation(&entries[*index].translation));
                (*index, text)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{RateLimiterContext, RetryPolicy};
    use crate::providers::mock::MockProvider;
    use serde_json::{Map, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn input_json(prompt: &str) -> Value {
        let start = prompt.find("### Input").unwrap_or(0);
        let block = &prompt[start..];
        let open = block.find("```json").map(|i| i + 7).unwrap_or(0);
        let close = block[open..].find("```").map(|i| open + i).unwrap_or(block.len());
        serde_json::from_str(block[open..close].trim()).unwrap_or(Value::Null)
    }

    fn shortening_responder(request: &CompletionRequest) -> String {
        let input = input_json(&request.prompt);
        let mut output = Map::new();
        for (id, _) in input.as_object().into_iter().flatten() {
            output.insert(id.clone(), Value::String("短".to_string()));
        }
        Value::Object(output).to_string()
    }

    fn trimmer(provider: MockProvider) -> DurationTrimmer {
        let limiter = Arc::new(RateLimiterContext::with_limits(
            Duration::from_millis(5),
            Duration::from_millis(20),
            Duration::from_millis(1),
            3,
        ));
        let client = CompletionClient::new(Arc::new(provider), limiter).with_policy(RetryPolicy::immediate(2));
        let config = TrimConfig {
            batch_size: 2,
            ..TrimConfig::default()
        };
        DurationTrimmer::new(client, config, "Chinese", 2)
    }

    fn long_entry(start: f64) -> SubtitleEntry {
        // 40 CJK chars take 8.4s; at 1.45x that is ~5.8s, over a 4s window
        SubtitleEntry::new("src", "一二三四五六七八九十".repeat(4), None, start, start + 4.0)
    }

    #[test]
    fn test_stripPunctuation_mixedMarks_shouldReplaceWithSpaces() {
        assert_eq!(strip_punctuation("你好，世界。"), "你好 世界");
        assert_eq!(strip_punctuation("Hi, there!"), "Hi  there");
    }

    #[test]
    fn test_needsTrim_shortWindow_shouldNeverTrim() {
        let trimmer = trimmer(MockProvider::constant("{}"));
        let entry = SubtitleEntry::new("src", "一二三四五六七八九十".repeat(4), None, 0.0, 3.0);
        assert!(!trimmer.needs_trim(&entry));
        assert!(trimmer.needs_trim(&long_entry(0.0)));
        let relaxed = SubtitleEntry::new("src", "好", None, 0.0, 4.0);
        assert!(!trimmer.needs_trim(&relaxed));
    }

    #[tokio::test]
    async fn test_trim_overBudgetEntries_shouldUseServiceText() {
        let provider = MockProvider::working(shortening_responder);
        let trimmer = trimmer(provider.clone());
        let entries = vec![
            long_entry(0.0),
            SubtitleEntry::new("src", "好", None, 4.0, 8.0),
            long_entry(8.0),
            long_entry(12.0),
        ];
        let outcome = trimmer.trim(entries).await;
        assert_eq!(outcome.trimmed, vec![0, 2, 3]);
        assert_eq!(outcome.entries[0].translation, "短");
        assert_eq!(outcome.entries[1].translation, "好");
        assert!(outcome.fallbacks.is_empty());
        // three entries in batches of two
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_trim_failingService_shouldFallBackToPunctuationStripping() {
        let trimmer = trimmer(MockProvider::failing());
        let entry = SubtitleEntry::new("src", format!("{}，{}。", "一二三四五六七八九十".repeat(2), "一二三四五六七八九十".repeat(2)), None, 0.0, 4.0);
        let outcome = trimmer.trim(vec![entry]).await;
        assert_eq!(outcome.fallbacks.len(), 1);
        assert_eq!(outcome.fallbacks[0].ids, vec![1]);
        assert!(!outcome.entries[0].translation.contains('，'));
        assert!(!outcome.entries[0].translation.contains('。'));
    }
}
