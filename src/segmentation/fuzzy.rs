/*!
 * Split-point recovery.
 *
 * The completion service returns a rewritten sentence with delimiter marks.
 * The cut positions are mapped back onto the original text by scanning for
 * the prefix most similar to each returned part.
 */

use log::warn;
use serde::{Deserialize, Serialize};

/// A recovered cut whose best similarity stayed under the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowConfidenceSplit {
    pub text: String,
    pub ratio: f64,
    /// Character offset of the accepted cut
    pub position: usize,
}

/// Recovered cut positions (character offsets into the original)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPositions {
    pub positions: Vec<usize>,
    pub low_confidence: Vec<LowConfidenceSplit>,
}

/// Similarity in `[0, 1]`: `2 * LCS / (len(a) + len(b))`
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());
    if la + lb == 0 {
        return 1.0;
    }
    let mut row = vec![0usize; lb + 1];
    for &ca in &a {
        advance_lcs_row(&mut row, ca, &b);
    }
    2.0 * row[lb] as f64 / (la + lb) as f64
}

/// Extend an LCS row by one character of the left string
fn advance_lcs_row(row: &mut [usize], ca: char, b: &[char]) {
    let mut diagonal = 0;
    for k in 1..row.len() {
        let above = row[k];
        row[k] = if ca == b[k - 1] {
            diagonal + 1
        } else {
            above.max(row[k - 1])
        };
        diagonal = above;
    }
}

/// Best cut `j` in `[start, len)` for the prefix `original[start..j]` against `part`
///
/// Returns `(j, ratio)` for the first maximum, `None` when the range is empty.
fn best_cut(original: &[char], start: usize, part: &[char]) -> Option<(usize, f64)> {
    let lb = part.len();
    let mut row = vec![0usize; lb + 1];
    let mut best: Option<(usize, f64)> = None;

    for j in start..original.len() {
        if j > start {
            advance_lcs_row(&mut row, original[j - 1], part);
        }
        let la = j - start;
        let ratio = if la + lb == 0 {
            1.0
        } else {
            2.0 * row[lb] as f64 / (la + lb) as f64
        };
        if best.is_none_or(|(_, r)| ratio > r) {
            best = Some((j, ratio));
        }
    }
    best
}

/// Map every delimiter in `modified` onto a cut position in `original`
///
/// Whitespace inside each returned part is normalized with `joiner` before
/// comparison. A boundary with no candidate leaves the previous cut in place.
pub fn find_split_positions(
    original: &str,
    modified: &str,
    joiner: &str,
    delimiter: &str,
    threshold: f64,
) -> SplitPositions {
    let original_chars: Vec<char> = original.chars().collect();
    let parts: Vec<&str> = modified.split(delimiter).collect();
    let mut result = SplitPositions::default();
    let mut start = 0;

    for (index, part) in parts.iter().take(parts.len().saturating_sub(1)).enumerate() {
        let normalized: Vec<char> = part
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(joiner)
            .chars()
            .collect();

        match best_cut(&original_chars, start, &normalized) {
            Some((position, ratio)) => {
                if ratio < threshold {
                    warn!(
                        "Low similarity {:.3} at best split point {} for part {}",
                        ratio,
                        position,
                        index + 1
                    );
                    result.low_confidence.push(LowConfidenceSplit {
                        text: original.to_string(),
                        ratio,
                        position,
                    });
                }
                result.positions.push(position);
                start = position;
            }
            None => {
                warn!("No split point found for part {} of \"{}\"", index + 1, original);
            }
        }
    }
    result
}

/// Cut `original` at character positions, trimming parts and dropping empty ones
pub fn apply_split_positions(original: &str, positions: &[usize]) -> Vec<String> {
    let chars: Vec<char> = original.chars().collect();
    let mut parts = Vec::with_capacity(positions.len() + 1);
    let mut previous = 0;
    for &position in positions.iter().chain(std::iter::once(&chars.len())) {
        let position = position.clamp(previous, chars.len());
        let part: String = chars[previous..position].iter().collect();
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
        previous = position;
    }
    parts
}
