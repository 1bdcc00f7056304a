/*!
 * Sentence segmentation.
 *
 * - `nlp`: tokenizer and sentence boundary analyzer
 * - `sentences`: speaker-aware grouping of transcript words into sentences
 * - `long_split`: deterministic splitting of oversized sentences
 * - `meaning`: completion-assisted splitting with fuzzy cut recovery
 * - `fuzzy`: split-point recovery on the original text
 * - `timing`: window interpolation and timing repair
 */

pub mod fuzzy;
pub mod long_split;
pub mod meaning;
pub mod nlp;
pub mod sentences;
pub mod timing;

use serde::{Deserialize, Serialize};

pub use fuzzy::{find_split_positions, LowConfidenceSplit};
pub use long_split::LongSentenceSplitter;
pub use meaning::{MeaningSplitOutcome, MeaningSplitter, SPLIT_DELIMITER};
pub use nlp::{RuleBasedAnalyzer, SentenceAnalyzer};
pub use sentences::SentenceSegmenter;

/// A sentence with its speaker and time window
///
/// `id` is the join key for every later stage once it has been assigned
/// by `renumber`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub id: u64,
    pub text: String,
    pub speaker_id: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl SentenceRecord {
    pub fn new(
        id: u64,
        text: impl Into<String>,
        speaker_id: Option<&str>,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            speaker_id: speaker_id.map(str::to_string),
            start,
            end,
        }
    }

    pub fn is_timed(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// Assign final sequential ids starting at 1
pub fn renumber(records: &mut [SentenceRecord]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.id = index as u64 + 1;
    }
}
