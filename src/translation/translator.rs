/*!
 * Two-phase chunk translation.
 *
 * A summary call first yields the transcript theme and a glossary. Each
 * chunk then goes through a faithful pass returning `{id: {id, origin,
 * direct}}` and, when enabled, an expressive pass returning `{id: {...,
 * free}}`. Both answers are validated against the exact id set of the
 * chunk. Chunks run concurrently and are joined back by id.
 */

use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::chunker::{build_chunks, chunk_context, Chunk};
use super::glossary::{summary_source, Glossary};
use crate::app_config::ChunkingConfig;
use crate::completion::{CompletionClient, ExpressiveTranslation, FaithfulTranslation, SummaryResponse};
use crate::errors::{CompletionError, FailedUnit};
use crate::prompts::{expressive_prompt, faithful_prompt, summary_prompt, ChunkContext, ExpressiveItem};
use crate::providers::CompletionRequest;
use crate::segmentation::SentenceRecord;

/// One translated sentence, keyed by the sentence id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub id: u64,
    pub source_text: String,
    pub translation: String,
    pub speaker_id: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TranslationResult {
    fn from_record(record: &SentenceRecord, translation: String) -> Self {
        Self {
            id: record.id,
            source_text: record.text.clone(),
            translation,
            speaker_id: record.speaker_id.clone(),
            start: record.start,
            end: record.end,
        }
    }
}

/// All translations plus the chunks that fell back to source text
#[derive(Debug, Clone, Default)]
pub struct TranslationOutcome {
    pub results: Vec<TranslationResult>,
    pub failed_chunks: Vec<FailedUnit>,
    pub glossary: Glossary,
    // @field: Set when the summary call failed and chunks ran without a theme
    pub summary_failure: Option<FailedUnit>,
}

pub struct ChunkTranslator {
    client: CompletionClient,
    config: ChunkingConfig,
    source_language: String,
    target_language: String,
    max_workers: usize,
}

impl ChunkTranslator {
    pub fn new(
        client: CompletionClient,
        config: ChunkingConfig,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        max_workers: usize,
    ) -> Self {
        Self {
            client,
            config,
            source_language: source_language.into(),
            target_language: target_language.into(),
            max_workers: max_workers.max(1),
        }
    }

    /// Translate every record, one result per id in input order
    ///
    /// A chunk that fails both retries keeps its source text as translation
    /// and is listed in `failed_chunks`.
    pub async fn translate_all<F>(&self, records: &[SentenceRecord], progress: F) -> TranslationOutcome
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let (glossary, summary_failure) = match self.summarize(records).await {
            Ok(glossary) => (glossary, None),
            Err(e) => {
                warn!("Summary failed, translating without a theme: {}", e);
                (
                    Glossary::from_terms(&self.config.custom_terms),
                    Some(FailedUnit::new("summarize", Vec::new(), e)),
                )
            }
        };

        let chunks = build_chunks(records, &self.config);
        let total = chunks.len();
        info!("Translating {} sentences in {} chunks", records.len(), total);

        let progress = &progress;
        let chunks_ref = &chunks;
        let glossary_ref = &glossary;
        let mut results = stream::iter(chunks.iter())
            .map(|chunk| async move {
                let result = self.translate_chunk(chunks_ref, chunk, glossary_ref).await;
                progress(chunk.index + 1, total);
                (chunk.index, result)
            })
            .buffer_unordered(self.max_workers)
            .collect::<Vec<_>>()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut translated: HashMap<u64, String> = HashMap::with_capacity(records.len());
        let mut failed_chunks = Vec::new();
        for (index, result) in results {
            match result {
                Ok(lines) => translated.extend(lines),
                Err(e) => {
                    error!("Translation of chunk {} failed: {}", index + 1, e);
                    failed_chunks.push(FailedUnit::new("translate", chunks[index].ids(), e));
                }
            }
        }

        let results = records
            .iter()
            .map(|record| {
                let translation = translated.remove(&record.id).unwrap_or_else(|| record.text.clone());
                TranslationResult::from_record(record, translation)
            })
            .collect();
        TranslationOutcome {
            results,
            failed_chunks,
            glossary,
            summary_failure,
        }
    }

    /// Theme and glossary for the whole transcript
    ///
    /// Returns the configured terms alone when summarizing is off or there
    /// is nothing to summarize.
    pub async fn summarize(&self, records: &[SentenceRecord]) -> Result<Glossary, CompletionError> {
        let content = summary_source(records, self.config.summary_max_chars);
        if !self.config.summarize || content.trim().is_empty() {
            return Ok(Glossary::from_terms(&self.config.custom_terms));
        }
        let prompt = summary_prompt(
            &content,
            &self.config.custom_terms,
            &self.source_language,
            &self.target_language,
        );
        let summary: SummaryResponse = self
            .client
            .ask_json(CompletionRequest::json(prompt, "summarize"), SummaryResponse::validate)
            .await?;
        let glossary = Glossary::merge(&self.config.custom_terms, &summary);
        info!("Summary ready with {} glossary terms", glossary.terms.len());
        Ok(glossary)
    }

    /// Translate one chunk into `(id, translation)` pairs
    pub async fn translate_chunk(
        &self,
        chunks: &[Chunk],
        chunk: &Chunk,
        glossary: &Glossary,
    ) -> Result<Vec<(u64, String)>, CompletionError> {
        let (previous, next) = chunk_context(chunks, chunk.index, &self.config);
        let chunk_text: String = chunk.records.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("\n");
        let context = ChunkContext {
            previous,
            next,
            summary: glossary.theme.as_deref(),
            notes: glossary.matching(&chunk_text),
        };
        let ids = chunk.ids();
        let lines = chunk.lines();

        let prompt = faithful_prompt(&lines, &context, &self.source_language, &self.target_language);
        let faithful: FaithfulTranslation = self
            .client
            .ask_json(CompletionRequest::json(prompt, "translate_faithfulness"), |response: &FaithfulTranslation| {
                response.validate(&ids)
            })
            .await?;

        let direct: Vec<(u64, String)> = chunk
            .records
            .iter()
            .map(|record| {
                let text = faithful.direct(record.id).unwrap_or_default();
                (record.id, strip_speaker_label(&text, record.speaker_id.as_deref()))
            })
            .collect();
        if !self.config.reflect_translate {
            return Ok(direct);
        }

        let items: Vec<ExpressiveItem<'_>> = lines
            .iter()
            .zip(&direct)
            .map(|((id, origin), (_, direct))| ExpressiveItem {
                id: *id,
                origin,
                direct,
            })
            .collect();
        let prompt = expressive_prompt(&items, &context, &self.source_language, &self.target_language);
        let expressive: ExpressiveTranslation = self
            .client
            .ask_json(
                CompletionRequest::json(prompt, "translate_expressiveness"),
                |response: &ExpressiveTranslation| response.validate(&ids),
            )
            .await?;

        Ok(direct
            .into_iter()
            .zip(&chunk.records)
            .map(|((id, direct), record)| match expressive.free(id) {
                Some(free) if !free.is_empty() => (id, strip_speaker_label(&free, record.speaker_id.as_deref())),
                _ => {
                    warn!("Empty expressive translation for line {}, keeping the literal one", id);
                    (id, direct)
                }
            })
            .collect())
    }
}

/// Drop a `[speaker]:` prefix the service echoed back
fn strip_speaker_label(text: &str, speaker_id: Option<&str>) -> String {
    let trimmed = text.trim();
    speaker_id
        .map(|speaker| format!("[{}]:", speaker))
        .and_then(|label| trimmed.strip_prefix(label.as_str()).map(|rest| rest.trim().to_string()))
        .unwrap_or_else(|| trimmed.to_string())
}
