/*!
 * Database entity models.
 *
 * Every stage boundary is stored as `StageRow`s: a stable integer id plus
 * text, translation, speaker and window. Conversions to and from the
 * pipeline types live here so the repository only deals with rows.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::segmentation::SentenceRecord;
use crate::subtitles::SubtitleEntry;
use crate::timeline::AudioTask;
use crate::translation::TranslationResult;

/// Pipeline stage whose output is checkpointed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sentences,
    Translations,
    Subtitles,
    AudioTasks,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Sentences => write!(f, "sentences"),
            Stage::Translations => write!(f, "translations"),
            Stage::Subtitles => write!(f, "subtitles"),
            Stage::AudioTasks => write!(f, "audio_tasks"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sentences" => Ok(Stage::Sentences),
            "translations" => Ok(Stage::Translations),
            "subtitles" => Ok(Stage::Subtitles),
            "audio_tasks" => Ok(Stage::AudioTasks),
            _ => Err(anyhow::anyhow!("Invalid stage: {}", s)),
        }
    }
}

/// One pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// UUID v4
    pub id: String,
    /// SHA-256 of the transcript file
    pub transcript_hash: String,
    pub source_language: String,
    pub target_language: String,
    pub created_at: String,
}

impl RunRecord {
    pub fn new(transcript_hash: String, source_language: String, target_language: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transcript_hash,
            source_language,
            target_language,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One row of a stage table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRow {
    pub id: u64,
    pub text: String,
    pub translation: Option<String>,
    pub speaker_id: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl From<&SentenceRecord> for StageRow {
    fn from(record: &SentenceRecord) -> Self {
        Self {
            id: record.id,
            text: record.text.clone(),
            translation: None,
            speaker_id: record.speaker_id.clone(),
            start: record.start,
            end: record.end,
        }
    }
}

impl From<StageRow> for SentenceRecord {
    fn from(row: StageRow) -> Self {
        SentenceRecord {
            id: row.id,
            text: row.text,
            speaker_id: row.speaker_id,
            start: row.start,
            end: row.end,
        }
    }
}

impl From<&TranslationResult> for StageRow {
    fn from(result: &TranslationResult) -> Self {
        Self {
            id: result.id,
            text: result.source_text.clone(),
            translation: Some(result.translation.clone()),
            speaker_id: result.speaker_id.clone(),
            start: result.start,
            end: result.end,
        }
    }
}

impl From<StageRow> for TranslationResult {
    fn from(row: StageRow) -> Self {
        TranslationResult {
            id: row.id,
            source_text: row.text,
            translation: row.translation.unwrap_or_default(),
            speaker_id: row.speaker_id,
            start: row.start,
            end: row.end,
        }
    }
}

/// Subtitle rows carry the id of the sentence each line was cut from
pub fn subtitle_rows(entries: &[SubtitleEntry], parent_ids: &[u64]) -> Vec<StageRow> {
    entries
        .iter()
        .zip(parent_ids)
        .map(|(entry, &parent_id)| StageRow {
            id: parent_id,
            text: entry.source.clone(),
            translation: Some(entry.translation.clone()),
            speaker_id: entry.speaker_id.clone(),
            start: Some(entry.start),
            end: Some(entry.end),
        })
        .collect()
}

impl From<StageRow> for SubtitleEntry {
    fn from(row: StageRow) -> Self {
        let start = row.start.unwrap_or(0.0);
        SubtitleEntry::new(
            row.text,
            row.translation.unwrap_or_default(),
            row.speaker_id.as_deref(),
            start,
            row.end.unwrap_or(start),
        )
    }
}

impl From<&AudioTask> for StageRow {
    fn from(task: &AudioTask) -> Self {
        Self {
            id: task.number as u64,
            text: task.origin.clone(),
            translation: Some(task.text.clone()),
            speaker_id: task.speaker_id.clone(),
            start: Some(task.start_time),
            end: Some(task.end_time),
        }
    }
}

impl From<StageRow> for AudioTask {
    fn from(row: StageRow) -> Self {
        let start_time = row.start.unwrap_or(0.0);
        let end_time = row.end.unwrap_or(start_time).max(start_time);
        AudioTask {
            number: row.id as usize,
            start_time,
            end_time,
            duration: end_time - start_time,
            text: row.translation.unwrap_or_default(),
            origin: row.text,
            speaker_id: row.speaker_id,
        }
    }
}
