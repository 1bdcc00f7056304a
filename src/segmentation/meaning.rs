/*!
 * Completion-assisted splitting of sentences that are still too long.
 *
 * Sentences over the token budget are sent in small batches; the answer
 * marks cut points with a delimiter, which are then recovered on the
 * original text by fuzzy matching so no model rewriting leaks through.
 * The phase is a fixed-point loop: it stops when nothing is over budget
 * or the configured number of passes is reached.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::Arc;

use super::fuzzy::{apply_split_positions, find_split_positions, LowConfidenceSplit};
use super::nlp::SentenceAnalyzer;
use super::SentenceRecord;
use crate::app_config::SegmentationConfig;
use crate::completion::{CompletionClient, RetryPolicy, SplitResponse};
use crate::errors::{CompletionError, FailedUnit};
use crate::prompts::{split_prompt, SplitItem};
use crate::providers::CompletionRequest;

/// Cut marker requested from the completion service
pub const SPLIT_DELIMITER: &str = "[br]";

/// Result of the meaning-split phase
#[derive(Debug, Clone, Default)]
pub struct MeaningSplitOutcome {
    pub records: Vec<SentenceRecord>,
    pub low_confidence: Vec<LowConfidenceSplit>,
    pub failed_batches: Vec<FailedUnit>,
    pub passes: usize,
}

/// Parts recovered for one batch, keyed by record index
struct BatchSplit {
    parts: Vec<(usize, Vec<String>)>,
    low_confidence: Vec<LowConfidenceSplit>,
}

#[derive(Clone)]
pub struct MeaningSplitter {
    client: CompletionClient,
    analyzer: Arc<dyn SentenceAnalyzer>,
    config: SegmentationConfig,
    language: String,
    joiner: &'static str,
}

impl MeaningSplitter {
    pub fn new(
        client: CompletionClient,
        analyzer: Arc<dyn SentenceAnalyzer>,
        config: SegmentationConfig,
        language: impl Into<String>,
        joiner: &'static str,
    ) -> Self {
        Self {
            client,
            analyzer,
            config,
            language: language.into(),
            joiner,
        }
    }

    /// Number of parts a sentence should be cut into, or `None` if short enough
    pub fn parts_needed(&self, text: &str) -> Option<usize> {
        let tokens = self.analyzer.token_count(text);
        let limit = self.config.max_split_length.max(1);
        (tokens > limit).then(|| tokens.div_ceil(limit).max(2))
    }

    /// Run the split passes over `records`
    pub async fn split_records(&self, records: Vec<SentenceRecord>) -> MeaningSplitOutcome {
        let mut outcome = MeaningSplitOutcome {
            records,
            ..Default::default()
        };

        for pass in 0..self.config.split_passes {
            let candidates: Vec<(usize, usize)> = outcome
                .records
                .iter()
                .enumerate()
                .filter_map(|(index, record)| self.parts_needed(&record.text).map(|parts| (index, parts)))
                .collect();
            if candidates.is_empty() {
                debug!("No sentence over {} tokens after {} passes", self.config.max_split_length, pass);
                break;
            }
            info!("Split pass {}: {} sentences over budget", pass + 1, candidates.len());
            outcome.passes = pass + 1;

            let batch_size = self.config.split_batch_size.max(1);
            let records = &outcome.records;
            let mut results = stream::iter(candidates.chunks(batch_size).enumerate())
                .map(|(batch_index, batch)| async move {
                    (batch_index, batch, self.split_batch(records, batch, pass).await)
                })
                .buffer_unordered(self.config.max_workers.max(1))
                .collect::<Vec<_>>()
                .await;
            results.sort_by_key(|(batch_index, _, _)| *batch_index);

            let mut replacements: HashMap<usize, Vec<String>> = HashMap::new();
            for (batch_index, batch, result) in results {
                match result {
                    Ok(split) => {
                        outcome.low_confidence.extend(split.low_confidence);
                        replacements.extend(split.parts);
                    }
                    Err(e) => {
                        error!("Split batch {} failed in pass {}: {}", batch_index + 1, pass + 1, e);
                        let ids = batch.iter().map(|(index, _)| outcome.records[*index].id).collect();
                        outcome.failed_batches.push(FailedUnit::new("split_by_meaning", ids, e));
                    }
                }
            }

            outcome.records = outcome
                .records
                .iter()
                .enumerate()
                .flat_map(|(index, record)| match replacements.get(&index) {
                    Some(parts) => record.split_into(parts),
                    None => vec![record.clone()],
                })
                .collect();
        }
        outcome
    }

    async fn split_batch(
        &self,
        records: &[SentenceRecord],
        batch: &[(usize, usize)],
        pass: usize,
    ) -> Result<BatchSplit, CompletionError> {
        let items: Vec<SplitItem<'_>> = batch
            .iter()
            .map(|(index, parts)| SplitItem {
                id: *index as u64 + 1,
                sentence: &records[*index].text,
                parts: *parts,
            })
            .collect();
        let expected: Vec<u64> = items.iter().map(|item| item.id).collect();

        let prompt = split_prompt(&items, &self.language, self.config.max_split_length, SPLIT_DELIMITER);
        let request = CompletionRequest::json(RetryPolicy::perturb(&prompt, pass), "split_by_meaning");
        let response: SplitResponse = self
            .client
            .ask_json(request, |response: &SplitResponse| response.validate(&expected, SPLIT_DELIMITER))
            .await?;

        let mut split = BatchSplit {
            parts: Vec::with_capacity(items.len()),
            low_confidence: Vec::new(),
        };
        for item in &items {
            let Some(marked) = response.split(item.id) else {
                continue;
            };
            let (parts, low) = self.recover(item.sentence, marked);
            split.low_confidence.extend(low);
            if parts.len() > 1 {
                split.parts.push((item.id as usize - 1, parts));
            }
        }
        Ok(split)
    }

    fn recover(&self, sentence: &str, marked: &str) -> (Vec<String>, Vec<LowConfidenceSplit>) {
        let found = find_split_positions(
            sentence,
            marked,
            self.joiner,
            SPLIT_DELIMITER,
            self.config.similarity_threshold,
        );
        (apply_split_positions(sentence, &found.positions), found.low_confidence)
    }

    /// Ask for a `parts`-way split of a single text
    ///
    /// Returns the original text as the only part when no cut was recovered.
    pub async fn split_text(&self, text: &str, parts: usize) -> Result<(Vec<String>, Vec<LowConfidenceSplit>), CompletionError> {
        let item = SplitItem {
            id: 1,
            sentence: text,
            parts: parts.max(2),
        };
        let prompt = split_prompt(
            std::slice::from_ref(&item),
            &self.language,
            self.config.max_split_length,
            SPLIT_DELIMITER,
        );
        let response: SplitResponse = self
            .client
            .ask_json(CompletionRequest::json(prompt, "split_by_meaning"), |response: &SplitResponse| {
                response.validate(&[1], SPLIT_DELIMITER)
            })
            .await?;

        match response.split(1) {
            Some(marked) => {
                let (parts, low) = self.recover(text, marked);
                if parts.is_empty() {
                    Ok((vec![text.to_string()], low))
                } else {
                    Ok((parts, low))
                }
            }
            None => Ok((vec![text.to_string()], Vec::new())),
        }
    }
}
