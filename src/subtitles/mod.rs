/*!
 * Subtitle entries and the stages that shape them.
 *
 * - `visual`: per-script reading length
 * - `fitter`: length fitting of translated lines
 * - `speech_rate`: spoken duration estimate
 * - `trimmer`: shortening of lines that cannot be spoken in time
 * - `srt`: track rendering
 */

use serde::{Deserialize, Serialize};

pub mod fitter;
pub mod speech_rate;
pub mod srt;
pub mod trimmer;
pub mod visual;

pub use fitter::{remerge_translations, FitOutcome, FittedLine, SubtitleFitter};
pub use speech_rate::SpeechRateModel;
pub use srt::{SrtBlock, TrackKind};
pub use trimmer::{DurationTrimmer, TrimOutcome};

// @struct: One displayed subtitle with both texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub source: String,
    pub translation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,

    // @field: Start time in seconds
    pub start: f64,

    // @field: End time in seconds, never before start
    pub end: f64,

    pub duration: f64,
}

impl SubtitleEntry {
    pub fn new(
        source: impl Into<String>,
        translation: impl Into<String>,
        speaker_id: Option<&str>,
        start: f64,
        end: f64,
    ) -> Self {
        let end = end.max(start);
        Self {
            source: source.into(),
            translation: translation.into(),
            speaker_id: speaker_id.map(str::to_string),
            start,
            end,
            duration: end - start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitleEntry_reversedWindow_shouldClampToZeroDuration() {
        let entry = SubtitleEntry::new("a", "b", Some("spk"), 2.0, 1.0);
        assert_eq!(entry.end, 2.0);
        assert_eq!(entry.duration, 0.0);
        assert_eq!(entry.speaker_id.as_deref(), Some("spk"));
    }
}
