use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::SubtitleEntry;
use crate::timeline::AudioTask;

// @struct: One numbered SRT block
#[derive(Debug, Clone, PartialEq)]
pub struct SrtBlock {
    // @field: Sequence number, 1-based
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    pub text: String,
}

impl SrtBlock {
    pub fn new(seq_num: usize, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            seq_num,
            start_time_ms: seconds_to_ms(start),
            end_time_ms: seconds_to_ms(end.max(start)),
            text: text.into(),
        }
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

/// Seconds to whole milliseconds, rounding to nearest
pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

impl fmt::Display for SrtBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_time_ms),
            Self::format_timestamp(self.end_time_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Which text of a subtitle entry a track shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Source,
    Translation,
    SourceOverTranslation,
    TranslationOverSource,
}

impl TrackKind {
    pub const ALL: [TrackKind; 4] = [
        TrackKind::Source,
        TrackKind::Translation,
        TrackKind::SourceOverTranslation,
        TrackKind::TranslationOverSource,
    ];

    /// Output file name of the track
    pub fn file_name(&self) -> &'static str {
        match self {
            TrackKind::Source => "src.srt",
            TrackKind::Translation => "trans.srt",
            TrackKind::SourceOverTranslation => "src_trans.srt",
            TrackKind::TranslationOverSource => "trans_src.srt",
        }
    }

    fn text(&self, entry: &SubtitleEntry) -> String {
        match self {
            TrackKind::Source => entry.source.trim().to_string(),
            TrackKind::Translation => entry.translation.trim().to_string(),
            TrackKind::SourceOverTranslation => {
                format!("{}\n{}", entry.source.trim(), entry.translation.trim())
            }
            TrackKind::TranslationOverSource => {
                format!("{}\n{}", entry.translation.trim(), entry.source.trim())
            }
        }
    }
}

/// Numbered blocks for one track of the fitted entries
pub fn entry_track(entries: &[SubtitleEntry], kind: TrackKind) -> Vec<SrtBlock> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| SrtBlock::new(index + 1, entry.start, entry.end, kind.text(entry)))
        .collect()
}

/// Dub track: one block per audio task with the text that is spoken
pub fn dub_track(tasks: &[AudioTask]) -> Vec<SrtBlock> {
    tasks
        .iter()
        .map(|task| SrtBlock::new(task.number, task.start_time, task.end_time, task.text.clone()))
        .collect()
}

/// Render blocks as SRT text
pub fn render(blocks: &[SrtBlock]) -> String {
    blocks.iter().map(ToString::to_string).collect()
}

/// Write blocks to an SRT file, creating the parent directory
pub fn write_srt<P: AsRef<Path>>(blocks: &[SrtBlock], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;
    for block in blocks {
        write!(file, "{}", block)?;
    }
    Ok(())
}
