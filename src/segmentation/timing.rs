/*!
 * Time windows for split sentences.
 */

use log::{debug, warn};

use super::SentenceRecord;
use crate::transcript::TranscriptWord;

/// Split `[start, end]` into contiguous windows proportional to `weights`
///
/// The windows cover the parent exactly: the first starts at `start`, the
/// last ends at `end`. All-zero weights share the window evenly.
pub fn interpolate_windows(start: f64, end: f64, weights: &[usize]) -> Vec<(f64, f64)> {
    if weights.is_empty() {
        return Vec::new();
    }
    let duration = (end - start).max(0.0);
    let total: usize = weights.iter().sum();
    let count = weights.len();

    let mut windows = Vec::with_capacity(count);
    let mut cumulative = 0usize;
    let mut window_start = start;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        let window_end = if index + 1 == count {
            start + duration
        } else if total == 0 {
            start + duration * (index + 1) as f64 / count as f64
        } else {
            start + duration * cumulative as f64 / total as f64
        };
        windows.push((window_start, window_end));
        window_start = window_end;
    }
    windows
}

/// Character weight of each part, as used for interpolation
pub fn char_weights<S: AsRef<str>>(parts: &[S]) -> Vec<usize> {
    parts.iter().map(|p| p.as_ref().chars().count()).collect()
}

/// Lowercased letters and digits only
fn normalize(text: &str) -> Vec<char> {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Fill sentences without timing from the word stream
///
/// The normalized sentence text is searched in the normalized concatenation
/// of all words, starting after the previous match. Sentences that still
/// cannot be placed get a zero-length window at the previous sentence's end.
pub fn repair_missing_timing(records: &mut [SentenceRecord], words: &[TranscriptWord]) {
    if records.iter().all(|r| r.start.is_some() && r.end.is_some()) {
        return;
    }

    let mut stream: Vec<char> = Vec::new();
    let mut owner: Vec<usize> = Vec::new();
    for (index, word) in words.iter().enumerate() {
        for c in normalize(&word.text) {
            stream.push(c);
            owner.push(index);
        }
    }

    let mut cursor = 0usize;
    let mut previous_end = 0.0_f64;
    for record in records.iter_mut() {
        let needle = normalize(&record.text);

        if let (Some(start), Some(end)) = (record.start, record.end) {
            previous_end = end.max(start);
            if let Some(found) = find_from(&stream, &needle, cursor) {
                cursor = found + needle.len();
            }
            continue;
        }

        match find_from(&stream, &needle, cursor).filter(|_| !needle.is_empty()) {
            Some(found) => {
                let first = &words[owner[found]];
                let last = &words[owner[found + needle.len() - 1]];
                record.start = Some(first.start);
                record.end = Some(last.end.max(first.start));
                cursor = found + needle.len();
                debug!("Recovered timing for sentence {} from words", record.id);
            }
            None => {
                warn!(
                    "No timing found for sentence {}; using a zero-length window at {:.3}s",
                    record.id, previous_end
                );
                record.start = Some(previous_end);
                record.end = Some(previous_end);
            }
        }
        previous_end = record.end.unwrap_or(previous_end);
    }
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}
