/*!
 * Iterative length fitting of translated lines.
 *
 * A line is flagged when its source is longer than `max_length` characters
 * or its weighted translation length (times `target_multiplier`) is. Each
 * flagged line is cut in two on the source side and the translation is
 * aligned to the same number of parts. The scan repeats until nothing is
 * flagged or `fit_passes` is reached.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;

use super::visual::visual_length;
use super::SubtitleEntry;
use crate::app_config::SubtitleConfig;
use crate::completion::{AlignResponse, CompletionClient};
use crate::errors::{CompletionError, FailedUnit};
use crate::prompts::align_prompt;
use crate::providers::CompletionRequest;
use crate::segmentation::timing::{char_weights, interpolate_windows};
use crate::segmentation::{LowConfidenceSplit, MeaningSplitter};
use crate::translation::TranslationResult;

/// One subtitle line during fitting, tied to the sentence it came from
#[derive(Debug, Clone, PartialEq)]
pub struct FittedLine {
    pub parent_id: u64,
    pub source: String,
    pub translation: String,
    pub speaker_id: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl From<&TranslationResult> for FittedLine {
    fn from(result: &TranslationResult) -> Self {
        Self {
            parent_id: result.id,
            source: result.source_text.clone(),
            translation: result.translation.clone(),
            speaker_id: result.speaker_id.clone(),
            start: result.start,
            end: result.end,
        }
    }
}

impl FittedLine {
    pub fn to_entry(&self) -> SubtitleEntry {
        let start = self.start.unwrap_or(0.0);
        SubtitleEntry::new(
            &self.source,
            &self.translation,
            self.speaker_id.as_deref(),
            start,
            self.end.unwrap_or(start),
        )
    }
}

/// Source and target parts for one split line
#[derive(Debug, Clone)]
struct LineSplit {
    source_parts: Vec<String>,
    target_parts: Vec<String>,
    low_confidence: Vec<LowConfidenceSplit>,
}

#[derive(Debug, Clone, Default)]
pub struct FitOutcome {
    pub lines: Vec<FittedLine>,
    pub low_confidence: Vec<LowConfidenceSplit>,
    pub failed: Vec<FailedUnit>,
    pub passes: usize,
    /// Sub-lines that had to be padded because part counts disagreed
    pub padded: usize,
}

impl FitOutcome {
    pub fn entries(&self) -> Vec<SubtitleEntry> {
        self.lines.iter().map(FittedLine::to_entry).collect()
    }
}

pub struct SubtitleFitter {
    splitter: MeaningSplitter,
    client: CompletionClient,
    config: SubtitleConfig,
    source_language: String,
    target_language: String,
    max_workers: usize,
}

impl SubtitleFitter {
    pub fn new(
        splitter: MeaningSplitter,
        client: CompletionClient,
        config: SubtitleConfig,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        max_workers: usize,
    ) -> Self {
        Self {
            splitter,
            client,
            config,
            source_language: source_language.into(),
            target_language: target_language.into(),
            max_workers: max_workers.max(1),
        }
    }

    /// True when the line breaks the length budget on either side
    pub fn needs_split(&self, source: &str, translation: &str) -> bool {
        let max_length = self.config.max_length as f64;
        source.chars().count() as f64 > max_length
            || visual_length(translation, &self.config.weights) * self.config.target_multiplier > max_length
    }

    pub async fn fit(&self, results: &[TranslationResult]) -> FitOutcome {
        let mut outcome = FitOutcome {
            lines: results.iter().map(FittedLine::from).collect(),
            ..Default::default()
        };

        for pass in 0..self.config.fit_passes {
            let flagged: Vec<usize> = outcome
                .lines
                .iter()
                .enumerate()
                .filter(|(_, line)| self.needs_split(&line.source, &line.translation))
                .map(|(index, _)| index)
                .collect();
            if flagged.is_empty() {
                debug!("All subtitle lines fit after {} passes", pass);
                break;
            }
            info!("Fit pass {}: {} lines over length", pass + 1, flagged.len());
            outcome.passes = pass + 1;

            let lines = &outcome.lines;
            let splits: HashMap<usize, Result<LineSplit, CompletionError>> = stream::iter(flagged)
                .map(|index| async move { (index, self.split_line(&lines[index]).await) })
                .buffer_unordered(self.max_workers)
                .collect()
                .await;

            let mut next = Vec::with_capacity(outcome.lines.len() + splits.len());
            for (index, line) in outcome.lines.iter().enumerate() {
                match splits.get(&index) {
                    Some(Ok(split)) => {
                        outcome.low_confidence.extend(split.low_confidence.iter().cloned());
                        next.extend(flatten_split(line, split, &mut outcome.padded));
                    }
                    Some(Err(e)) => {
                        error!("Alignment for line of sentence {} failed, keeping it whole: {}", line.parent_id, e);
                        outcome.failed.push(FailedUnit::new("align_subs", vec![line.parent_id], e));
                        next.push(line.clone());
                    }
                    None => next.push(line.clone()),
                }
            }
            outcome.lines = next;
        }
        outcome
    }

    async fn split_line(&self, line: &FittedLine) -> Result<LineSplit, CompletionError> {
        let (source_parts, low_confidence) = self.splitter.split_text(&line.source, 2).await?;
        if source_parts.len() < 2 {
            return Ok(LineSplit {
                source_parts: vec![line.source.clone()],
                target_parts: vec![line.translation.clone()],
                low_confidence,
            });
        }

        let prompt = align_prompt(
            &line.source,
            &line.translation,
            &source_parts,
            &self.source_language,
            &self.target_language,
        );
        let expected = source_parts.len();
        let aligned: AlignResponse = self
            .client
            .ask_json(CompletionRequest::json(prompt, "align_subs"), |response: &AlignResponse| {
                response.validate(expected)
            })
            .await?;

        Ok(LineSplit {
            source_parts,
            target_parts: aligned.target_parts(),
            low_confidence,
        })
    }
}

/// Joined translation of every sentence, in input order
///
/// `parts` are `(sentence id, piece)` pairs in subtitle order; a sentence
/// with no pieces keeps its original translation.
pub fn remerge_translations<'a>(
    results: &[TranslationResult],
    parts: impl IntoIterator<Item = (u64, &'a str)>,
    joiner: &str,
) -> Vec<(u64, String)> {
    let mut pieces: HashMap<u64, Vec<&str>> = HashMap::new();
    for (id, piece) in parts {
        if !piece.is_empty() {
            pieces.entry(id).or_default().push(piece);
        }
    }
    results
        .iter()
        .map(|result| {
            let joined = pieces
                .get(&result.id)
                .map(|p| p.join(joiner))
                .unwrap_or_else(|| result.translation.clone());
            (result.id, joined)
        })
        .collect()
}

/// Sub-lines for a split, windows interpolated by source length
///
/// Both part lists are padded to equal length with empty strings; every
/// padded slot is counted and logged.
fn flatten_split(line: &FittedLine, split: &LineSplit, padded: &mut usize) -> Vec<FittedLine> {
    let count = split.source_parts.len().max(split.target_parts.len());
    let mut source_parts = split.source_parts.clone();
    let mut target_parts = split.target_parts.clone();
    if source_parts.len() != target_parts.len() {
        warn!(
            "Sentence {} split into {} source and {} target parts; padding to {}",
            line.parent_id,
            source_parts.len(),
            target_parts.len(),
            count
        );
        *padded += count * 2 - source_parts.len() - target_parts.len();
        source_parts.resize(count, String::new());
        target_parts.resize(count, String::new());
    }

    let windows: Vec<(Option<f64>, Option<f64>)> = match (line.start, line.end) {
        (Some(start), Some(end)) => interpolate_windows(start, end, &char_weights(&source_parts))
            .into_iter()
            .map(|(s, e)| (Some(s), Some(e)))
            .collect(),
        _ => vec![(None, None); count],
    };

    source_parts
        .into_iter()
        .zip(target_parts)
        .zip(windows)
        .map(|((source, translation), (start, end))| FittedLine {
            parent_id: line.parent_id,
            source,
            translation,
            speaker_id: line.speaker_id.clone(),
            start,
            end,
        })
        .collect()
}
