/*!
 * Spoken duration estimate for a line of text.
 *
 * Latin and Cyrillic words are counted in vowel groups, CJK characters,
 * kana and Hangul blocks one unit each, Thai per character. Punctuation
 * adds a pause.
 */

use crate::app_config::SpeechRateConfig;
use crate::language_utils::{script_of, Script};

const VOWELS: &str = "aeiouyáéíóúýàèìòùâêîôûäëïöüÿåæøœãõаеёиоуыэюяіїє";
const COMMA_MARKS: &[char] = &[',', ';', ':', '，', '、', '；', '：'];
const SENTENCE_MARKS: &[char] = &['.', '!', '?', '…', '。', '！', '？'];

#[derive(Debug, Clone, Copy, Default)]
pub struct SpeechRateModel {
    rates: SpeechRateConfig,
}

impl SpeechRateModel {
    pub fn new(rates: SpeechRateConfig) -> Self {
        Self { rates }
    }

    /// Estimated seconds needed to speak `text`
    pub fn estimate_duration(&self, text: &str) -> f64 {
        let mut seconds = 0.0;
        let mut syllables = 0usize;
        let mut word = String::new();

        for c in text.chars() {
            let elision = matches!(c, '\'' | '’') && !word.is_empty();
            if elision || (c.is_alphabetic() && script_of(c) == Script::Other) {
                word.push(c);
                continue;
            }
            syllables += count_syllables(&word);
            word.clear();

            if c.is_ascii_digit() {
                syllables += 1;
            } else if COMMA_MARKS.contains(&c) {
                seconds += self.rates.comma_pause;
            } else if SENTENCE_MARKS.contains(&c) {
                seconds += self.rates.sentence_pause;
            } else {
                seconds += match script_of(c) {
                    Script::Cjk => self.rates.cjk_char,
                    Script::Hangul if ('\u{AC00}'..='\u{D7A3}').contains(&c) => self.rates.cjk_char,
                    Script::Thai if c.is_alphabetic() => self.rates.thai_char,
                    _ => 0.0,
                };
            }
        }
        syllables += count_syllables(&word);
        seconds + syllables as f64 * self.rates.syllable
    }
}

/// Vowel groups in one word, at least one for any non-empty word
fn count_syllables(word: &str) -> usize {
    if word.is_empty() {
        return 0;
    }
    let mut groups = 0;
    let mut in_vowel = false;
    for c in word.chars().flat_map(char::to_lowercase) {
        let vowel = VOWELS.contains(c);
        if vowel && !in_vowel {
            groups += 1;
        }
        in_vowel = vowel;
    }
    groups.max(1)
}
