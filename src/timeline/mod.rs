/*!
 * Audio timeline: task building, clip rendering and final assembly.
 *
 * - `builder`: merges short subtitle entries into numbered audio tasks
 * - `tts`: speech synthesis boundary
 * - `assembler`: decodes clips and folds them onto one mono track
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod assembler;
pub mod builder;
pub mod tts;

pub use assembler::{AssemblyReport, AudioTimelineAssembler};
pub use builder::{clean_tts_text, TimelineBuilder, TimelineOutcome};
pub use tts::{render_clips, CommandSynthesizer, RenderReport, SpeechSynthesizer};

// @struct: One unit of synthesized speech on the final timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTask {
    // @field: 1-based, reassigned after merges
    pub number: usize,

    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,

    // @field: Text to speak
    pub text: String,

    // @field: Source text the speech was translated from
    pub origin: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
}

impl AudioTask {
    fn set_end(&mut self, end_time: f64) {
        self.end_time = end_time.max(self.start_time);
        self.duration = self.end_time - self.start_time;
    }
}

/// Where the clip of a task lives inside a clip directory
pub fn clip_path(clip_dir: &Path, task: &AudioTask) -> PathBuf {
    clip_dir.join(format!("{}.wav", task.number))
}
