use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::AudioTask;
use crate::app_config::TimelineConfig;
use crate::subtitles::SubtitleEntry;

static PARENTHESES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)|（[^）]*）").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Text as it should be spoken: no parenthesised asides, no dashes
pub fn clean_tts_text(text: &str) -> String {
    let without_asides = PARENTHESES.replace_all(text, "");
    let without_dashes = without_asides.replace('-', "");
    WHITESPACE.replace_all(without_dashes.trim(), " ").to_string()
}

#[derive(Debug, Clone, Default)]
pub struct TimelineOutcome {
    pub tasks: Vec<AudioTask>,
    pub merged: usize,
    pub extended: usize,
    /// Conditions that were left as they are
    pub warnings: Vec<String>,
}

pub struct TimelineBuilder {
    min_duration: f64,
}

impl TimelineBuilder {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            min_duration: config.min_subtitle_duration,
        }
    }

    /// Merges or extends entries shorter than the minimum duration.
    ///
    /// The scan is order dependent: a merged entry is re-examined before
    /// moving on, and an extension may overlap the next entry.
    pub fn build(&self, entries: &[SubtitleEntry]) -> TimelineOutcome {
        let mut sorted: Vec<&SubtitleEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut tasks: Vec<AudioTask> = sorted
            .into_iter()
            .enumerate()
            .map(|(index, entry)| AudioTask {
                number: index + 1,
                start_time: entry.start,
                end_time: entry.end,
                duration: entry.duration,
                text: clean_tts_text(&entry.translation),
                origin: entry.source.trim().to_string(),
                speaker_id: entry.speaker_id.clone(),
            })
            .collect();

        let mut outcome = TimelineOutcome::default();
        let mut i = 0;
        while i < tasks.len() {
            if tasks[i].duration >= self.min_duration {
                i += 1;
                continue;
            }

            let has_next = i + 1 < tasks.len();
            if has_next && self.can_merge(&tasks[i], &tasks[i + 1]) {
                let next = tasks.remove(i + 1);
                debug!("Merging audio task {} into {}", next.number, tasks[i].number);
                let current = &mut tasks[i];
                current.text = join_text(&current.text, &next.text);
                current.origin = join_text(&current.origin, &next.origin);
                current.set_end(current.end_time.max(next.end_time));
                outcome.merged += 1;
                continue;
            }

            if has_next {
                debug!("Extending audio task {} to {:.2}s", tasks[i].number, self.min_duration);
                let start = tasks[i].start_time;
                tasks[i].set_end(start + self.min_duration);
                outcome.extended += 1;
            } else {
                let message = format!(
                    "Last audio task {} lasts {:.2}s, below the {:.2}s minimum; left unchanged",
                    tasks[i].number, tasks[i].duration, self.min_duration
                );
                warn!("{}", message);
                outcome.warnings.push(message);
            }
            i += 1;
        }

        for (index, task) in tasks.iter_mut().enumerate() {
            task.number = index + 1;
        }
        outcome.tasks = tasks;
        outcome
    }

    fn can_merge(&self, current: &AudioTask, next: &AudioTask) -> bool {
        next.start_time - current.start_time < self.min_duration && current.speaker_id == next.speaker_id
    }
}

/// Join merged texts with a single space
///
/// Empty sides come from lines padded after an alignment mismatch; they add
/// no separator, so merging never leaves a stray space.
fn join_text(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{} {}", left, right),
    }
}
