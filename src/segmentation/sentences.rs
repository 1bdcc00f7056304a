use log::debug;
use std::sync::Arc;

use super::nlp::{is_punctuation_only, SentenceAnalyzer};
use super::SentenceRecord;
use crate::transcript::TranscriptWord;

/// Byte range of one word inside the joined buffer, with its timing
#[derive(Debug, Clone, Copy)]
struct WordSpan {
    start_byte: usize,
    end_byte: usize,
    start: f64,
    end: f64,
}

/// Groups transcript words into speaker-consistent sentences
pub struct SentenceSegmenter {
    analyzer: Arc<dyn SentenceAnalyzer>,
    joiner: &'static str,
}

impl SentenceSegmenter {
    pub fn new(analyzer: Arc<dyn SentenceAnalyzer>, joiner: &'static str) -> Self {
        Self { analyzer, joiner }
    }

    /// Build sentences with fresh sequential ids starting at 1
    pub fn segment(&self, words: &[TranscriptWord]) -> Vec<SentenceRecord> {
        let mut sentences: Vec<SentenceRecord> = Vec::new();

        let mut group_start = 0;
        for index in 1..=words.len() {
            let speaker_changed = index == words.len()
                || words[index].speaker_id != words[group_start].speaker_id;
            if speaker_changed && group_start < index {
                self.segment_group(&words[group_start..index], &mut sentences);
                group_start = index;
            }
        }

        let mut merged = merge_punctuation_fragments(sentences);
        for (index, record) in merged.iter_mut().enumerate() {
            record.id = index as u64 + 1;
        }
        debug!("Segmented {} words into {} sentences", words.len(), merged.len());
        merged
    }

    fn segment_group(&self, group: &[TranscriptWord], out: &mut Vec<SentenceRecord>) {
        let mut buffer = String::new();
        let mut spans = Vec::with_capacity(group.len());
        for word in group {
            if !buffer.is_empty() {
                buffer.push_str(self.joiner);
            }
            let start_byte = buffer.len();
            buffer.push_str(&word.text);
            spans.push(WordSpan {
                start_byte,
                end_byte: buffer.len(),
                start: word.start,
                end: word.end,
            });
        }

        let speaker_id = group.first().and_then(|w| w.speaker_id.clone());
        for (sentence_start, sentence_end) in self.analyzer.sentences(&buffer) {
            let overlapping = spans
                .iter()
                .filter(|w| w.end_byte > sentence_start && w.start_byte < sentence_end);
            let (start, end) = overlapping.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), w| {
                (
                    Some(lo.map_or(w.start, |v: f64| v.min(w.start))),
                    Some(hi.map_or(w.end, |v: f64| v.max(w.end))),
                )
            });
            out.push(SentenceRecord {
                id: 0,
                text: buffer[sentence_start..sentence_end].to_string(),
                speaker_id: speaker_id.clone(),
                start,
                end,
            });
        }
    }
}

/// Fold punctuation-only sentences into the sentence before them
fn merge_punctuation_fragments(sentences: Vec<SentenceRecord>) -> Vec<SentenceRecord> {
    let mut merged: Vec<SentenceRecord> = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        let trimmed = sentence.text.trim();
        if trimmed.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(previous) if is_punctuation_only(trimmed) => {
                previous.text.push_str(trimmed);
                previous.end = match (previous.end, sentence.end) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
            _ => merged.push(sentence),
        }
    }
    merged
}
