use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities
///
/// ISO 639 code handling for the configured source and target languages,
/// and the per-character script classification used by the length and
/// speech-rate models.

/// ISO 639-2/B codes that differ from their 639-2/T counterparts
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => {
            if let Some(lang) = Language::from_639_1(&normalized_code) {
                return Ok(lang.to_639_3().to_string());
            }
        }
        3 => {
            if Language::from_639_3(&normalized_code).is_some() {
                return Ok(normalized_code);
            }
            if let Some((_, terminology)) = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(bibliographic, _)| *bibliographic == normalized_code)
            {
                return Ok((*terminology).to_string());
            }
        }
        _ => {}
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Writing system of a single character, as far as subtitle layout cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// CJK ideographs, Hiragana and Katakana
    Cjk,
    /// Hangul syllables and Jamo
    Hangul,
    Thai,
    /// Full-width ASCII variants
    FullWidth,
    Other,
}

/// Classify one character
pub fn script_of(c: char) -> Script {
    match c as u32 {
        0x4E00..=0x9FFF | 0x3040..=0x30FF => Script::Cjk,
        0xAC00..=0xD7A3 | 0x1100..=0x11FF => Script::Hangul,
        0x0E00..=0x0E7F => Script::Thai,
        0xFF01..=0xFF5E => Script::FullWidth,
        _ => Script::Other,
    }
}
