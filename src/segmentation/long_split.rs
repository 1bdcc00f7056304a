/*!
 * Deterministic splitting of oversized sentences.
 *
 * Cut order: first internal comma, then the first connector word, then the
 * sentence root, then fixed token windows. Every cut is a byte offset into
 * the original sentence, so joining the trimmed parts with the language
 * joiner gives the sentence back. No network calls are made here.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::nlp::{is_punctuation_only, trim_range, SentenceAnalyzer, Token};
use super::timing::{char_weights, interpolate_windows};
use super::SentenceRecord;
use crate::app_config::LongSentenceConfig;

static CONNECTOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(but|and|or|so|yet|for|nor|however|therefore|nevertheless|moreover|furthermore|consequently|besides|meanwhile)\b",
    )
    .unwrap()
});

pub struct LongSentenceSplitter {
    analyzer: Arc<dyn SentenceAnalyzer>,
    config: LongSentenceConfig,
    joiner: &'static str,
}

impl LongSentenceSplitter {
    pub fn new(analyzer: Arc<dyn SentenceAnalyzer>, config: LongSentenceConfig, joiner: &'static str) -> Self {
        Self { analyzer, config, joiner }
    }

    /// Split every record, interpolating child windows inside the parent
    ///
    /// Children keep the parent's id; ids are renumbered once splitting ends.
    pub fn split_records(&self, records: &[SentenceRecord]) -> Vec<SentenceRecord> {
        let mut output = Vec::with_capacity(records.len());
        for record in records {
            let parts = self.split_text(&record.text);
            if parts.len() > 1 {
                debug!("Sentence {} split into {} parts", record.id, parts.len());
            }
            output.extend(record.split_into(&parts));
        }
        output
    }

    /// Split one sentence into trimmed parts
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let Some((start, end)) = trim_range(text, 0, text.len()) else {
            return Vec::new();
        };
        let mut ranges = Vec::new();
        self.split_range(text, start, end, &mut ranges);
        merge_punctuation_ranges(text, ranges)
            .into_iter()
            .map(|(s, e)| text[s..e].to_string())
            .collect()
    }

    fn split_range(&self, text: &str, start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
        let piece = &text[start..end];
        if piece.chars().count() <= self.config.char_threshold {
            out.push((start, end));
            return;
        }

        if let Some(cut) = self.comma_cut(piece).or_else(|| self.connector_cut(piece)) {
            if let Some((left, right)) = halves(text, start, start + cut, end) {
                self.split_range(text, left.0, left.1, out);
                self.split_range(text, right.0, right.1, out);
                return;
            }
        }

        let tokens = self.analyzer.tokenize(piece);
        if tokens.len() > self.config.hard_cap_tokens {
            self.split_by_root(text, start, end, &tokens, out);
        } else {
            out.push((start, end));
        }
    }

    /// Byte offset just past the first clause comma far enough from both ends
    fn comma_cut(&self, piece: &str) -> Option<usize> {
        let length = piece.chars().count();
        let margin = self.config.comma_margin;
        piece
            .char_indices()
            .enumerate()
            .find(|(index, (byte, c))| {
                *index > margin && length - index > margin && is_clause_comma(piece, *byte, *c)
            })
            .map(|(_, (byte, c))| byte + c.len_utf8())
    }

    /// Byte offset of the first internal connector word
    fn connector_cut(&self, piece: &str) -> Option<usize> {
        CONNECTOR_PATTERN
            .find_iter(piece)
            .find(|m| {
                m.start() > 0
                    && piece[..m.start()].ends_with(char::is_whitespace)
                    && !piece[m.end()..].trim().is_empty()
            })
            .map(|m| m.start())
    }

    fn split_by_root(&self, text: &str, start: usize, end: usize, tokens: &[Token], out: &mut Vec<(usize, usize)>) {
        let piece = &text[start..end];
        let root_cut = self
            .analyzer
            .root_index(piece, tokens)
            .and_then(|root| self.nearest_boundary(piece, tokens, root))
            .and_then(|index| halves(text, start, start + tokens[index].start, end));

        if let Some((left, right)) = root_cut {
            let cap = self.config.hard_cap_tokens;
            let left_tokens = self.analyzer.token_count(&text[left.0..left.1]);
            let right_tokens = self.analyzer.token_count(&text[right.0..right.1]);
            if left_tokens <= cap && right_tokens <= cap {
                out.push(left);
                out.push(right);
                return;
            }
        }
        self.split_by_windows(text, start, end, tokens, out);
    }

    /// Cut every `window_tokens` tokens at the next valid boundary
    fn split_by_windows(&self, text: &str, start: usize, end: usize, tokens: &[Token], out: &mut Vec<(usize, usize)>) {
        let piece = &text[start..end];
        let window = self.config.window_tokens.max(1);
        let mut segment_start = start;
        let mut since_cut = 0;
        for (index, token) in tokens.iter().enumerate() {
            if since_cut >= window && self.is_boundary(piece, tokens, index) {
                if let Some(range) = trim_range(text, segment_start, start + token.start) {
                    out.push(range);
                }
                segment_start = start + token.start;
                since_cut = 0;
            }
            since_cut += 1;
        }
        if let Some(range) = trim_range(text, segment_start, end) {
            out.push(range);
        }
    }

    /// A cut before token `index` keeps the text recoverable by the joiner
    fn is_boundary(&self, piece: &str, tokens: &[Token], index: usize) -> bool {
        if index == 0 || index >= tokens.len() {
            return false;
        }
        self.joiner.is_empty() || piece[..tokens[index].start].ends_with(char::is_whitespace)
    }

    /// Closest valid boundary to `root`, preferring word tokens
    fn nearest_boundary(&self, piece: &str, tokens: &[Token], root: usize) -> Option<usize> {
        let mut candidates: Vec<usize> = (1..tokens.len())
            .filter(|&i| self.is_boundary(piece, tokens, i))
            .collect();
        candidates.sort_by_key(|&i| (tokens[i].is_punct, i.abs_diff(root), i));
        candidates.first().copied()
    }
}

/// A comma standing as its own token, not a digit group separator
///
/// Full-width commas always count; an ASCII comma must be followed by
/// whitespace or the end of the piece.
fn is_clause_comma(piece: &str, byte: usize, c: char) -> bool {
    match c {
        '，' => true,
        ',' => piece[byte + 1..].chars().next().map_or(true, char::is_whitespace),
        _ => false,
    }
}

/// Trimmed non-empty halves of `[start, end)` cut at `cut`
fn halves(text: &str, start: usize, cut: usize, end: usize) -> Option<((usize, usize), (usize, usize))> {
    Some((trim_range(text, start, cut)?, trim_range(text, cut, end)?))
}

/// Fold punctuation-only ranges into their neighbour
///
/// A leading fragment joins the next range, any other joins the previous.
fn merge_punctuation_ranges(text: &str, ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    let mut pending_start: Option<usize> = None;
    for (start, end) in ranges {
        if is_punctuation_only(&text[start..end]) {
            match merged.last_mut() {
                Some(previous) => previous.1 = end,
                None => {
                    pending_start.get_or_insert(start);
                }
            }
            continue;
        }
        merged.push((pending_start.take().unwrap_or(start), end));
    }
    if let Some(start) = pending_start {
        merged.push((start, text.len()));
    }
    merged
}

impl SentenceRecord {
    /// Children for `parts` with windows interpolated by character length
    pub fn split_into(&self, parts: &[String]) -> Vec<SentenceRecord> {
        if parts.len() <= 1 {
            return vec![self.clone()];
        }
        let windows = match (self.start, self.end) {
            (Some(start), Some(end)) => interpolate_windows(start, end, &char_weights(parts))
                .into_iter()
                .map(|(s, e)| (Some(s), Some(e)))
                .collect(),
            _ => vec![(None, None); parts.len()],
        };
        parts
            .iter()
            .zip(windows)
            .map(|(text, (start, end))| SentenceRecord {
                id: self.id,
                text: text.clone(),
                speaker_id: self.speaker_id.clone(),
                start,
                end,
            })
            .collect()
    }
}
