/*!
 * Word-level transcript input.
 *
 * Reads the recognizer output (`{segments: [{start, end, text, speaker?, words}]}`)
 * and flattens it into timed words carrying their speaker.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::file_utils::FileManager;

/// One recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub speaker_id: Option<String>,
}

impl TranscriptWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64, speaker_id: Option<&str>) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            speaker_id: speaker_id.map(str::to_string),
        }
    }
}

/// Recognizer output
#[derive(Debug, Clone, Deserialize)]
pub struct AsrTranscript {
    pub segments: Vec<AsrSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsrSegment {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub words: Vec<AsrWord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsrWord {
    pub word: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Recognizers write the string "None" for unattributed speech
fn normalize_speaker(speaker: Option<&String>) -> Option<String> {
    speaker
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && *s != "None")
        .map(str::to_string)
}

impl AsrTranscript {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse transcript JSON")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = FileManager::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Flatten into ordered words
    ///
    /// Words inherit the segment speaker unless they carry their own. A word
    /// without timing borrows the previous word's end (or the segment bounds)
    /// so the output is always monotonic within a segment.
    pub fn words(&self) -> Vec<TranscriptWord> {
        let mut words = Vec::new();
        let mut last_end = 0.0_f64;

        for segment in &self.segments {
            let segment_speaker = normalize_speaker(segment.speaker.as_ref());
            let segment_start = segment.start.unwrap_or(last_end);
            let segment_end = segment.end.unwrap_or(segment_start);
            let mut cursor = segment_start;

            if segment.words.is_empty() && !segment.text.trim().is_empty() {
                words.push(TranscriptWord {
                    text: segment.text.trim().to_string(),
                    start: segment_start,
                    end: segment_end.max(segment_start),
                    speaker_id: segment_speaker.clone(),
                });
                last_end = segment_end.max(segment_start);
                continue;
            }

            for word in &segment.words {
                let text = word.word.trim();
                if text.is_empty() {
                    continue;
                }
                let start = word.start.unwrap_or(cursor);
                let end = word.end.unwrap_or(start).max(start);
                let speaker_id = normalize_speaker(word.speaker.as_ref()).or_else(|| segment_speaker.clone());
                words.push(TranscriptWord {
                    text: text.to_string(),
                    start,
                    end,
                    speaker_id,
                });
                cursor = end;
            }
            last_end = cursor.max(segment_end);
        }

        words
    }
}
