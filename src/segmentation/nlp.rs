/*!
 * Tokenization and sentence boundary detection.
 *
 * `SentenceAnalyzer` is the seam where a real NLP toolkit can be plugged in.
 * `RuleBasedAnalyzer` is the built-in implementation: regex tokens (CJK
 * characters count as one token each), terminal punctuation boundaries and
 * a midpoint heuristic standing in for the dependency root.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\p{Han}\p{Hiragana}\p{Katakana}]|[\w&&[^\p{Han}\p{Hiragana}\p{Katakana}]]+(?:['’][\w&&[^\p{Han}\p{Hiragana}\p{Katakana}]]+)*|[^\w\s]",
    )
    .unwrap()
});

const TERMINALS: &[char] = &['.', '!', '?', '…', '。', '！', '？'];
const WIDE_TERMINALS: &[char] = &['。', '！', '？'];
const CLOSERS: &[char] = &['"', '\'', '”', '’', ')', ']', '」', '』', '）', '》'];

/// A token as a byte range of the analyzed text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    /// No letters or digits
    pub is_punct: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Tokenizer, sentence splitter and syntactic root finder
pub trait SentenceAnalyzer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Trimmed byte ranges of the sentences in `text`
    fn sentences(&self, text: &str) -> Vec<(usize, usize)>;

    /// Index of the token heading the main clause
    fn root_index(&self, text: &str, tokens: &[Token]) -> Option<usize>;

    fn token_count(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }
}

/// Regex and punctuation driven analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAnalyzer;

impl RuleBasedAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

/// Shrink a byte range to exclude surrounding whitespace
pub fn trim_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    let (s, e) = (start + leading, end - trailing);
    (s < e).then_some((s, e))
}

/// True when `text` has no letters or digits
pub fn is_punctuation_only(text: &str) -> bool {
    !text.chars().any(char::is_alphanumeric)
}

impl SentenceAnalyzer for RuleBasedAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        TOKEN_PATTERN
            .find_iter(text)
            .map(|m| Token {
                start: m.start(),
                end: m.end(),
                is_punct: is_punctuation_only(m.as_str()),
            })
            .collect()
    }

    fn sentences(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut spans = Vec::new();
        let mut sentence_start = 0;
        let mut i = 0;

        while i < chars.len() {
            let (_, c) = chars[i];
            if !TERMINALS.contains(&c) {
                i += 1;
                continue;
            }

            let mut j = i;
            let mut wide = false;
            let mut only_periods = true;
            while j < chars.len() && TERMINALS.contains(&chars[j].1) {
                wide |= WIDE_TERMINALS.contains(&chars[j].1);
                only_periods &= chars[j].1 == '.';
                j += 1;
            }
            while j < chars.len() && CLOSERS.contains(&chars[j].1) {
                j += 1;
            }

            let next = chars.get(j).map(|(_, c)| *c);
            let boundary = if wide {
                true
            } else {
                match next {
                    None => true,
                    Some(n) if n.is_whitespace() => {
                        // "e.g. this" or "Mr. smith" style continuations
                        let following = chars[j..].iter().map(|(_, c)| *c).find(|c| !c.is_whitespace());
                        !(only_periods && j - i == 1 && following.is_some_and(char::is_lowercase))
                    }
                    Some(_) => false,
                }
            };

            if boundary {
                let end = chars.get(j).map(|(b, _)| *b).unwrap_or(text.len());
                if let Some(span) = trim_range(text, sentence_start, end) {
                    spans.push(span);
                }
                sentence_start = end;
            }
            i = j.max(i + 1);
        }

        if let Some(span) = trim_range(text, sentence_start, text.len()) {
            spans.push(span);
        }
        spans
    }

    fn root_index(&self, text: &str, tokens: &[Token]) -> Option<usize> {
        if tokens.len() < 3 {
            return None;
        }
        let middle = tokens.len() / 2;
        (1..tokens.len() - 1)
            .filter(|&i| !tokens[i].is_punct && !tokens[i].text(text).is_empty())
            .min_by_key(|&i| i.abs_diff(middle))
    }
}
