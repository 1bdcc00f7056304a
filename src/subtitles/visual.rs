use crate::app_config::ScriptWeights;
use crate::language_utils::{script_of, Script};

/// Reading weight of one character
pub fn char_weight(c: char, weights: &ScriptWeights) -> f64 {
    match script_of(c) {
        Script::Cjk => weights.cjk,
        Script::Hangul => weights.hangul,
        Script::Thai => weights.thai,
        Script::FullWidth => weights.full_width,
        Script::Other => 1.0,
    }
}

/// Per-script weighted character count
pub fn visual_length(text: &str, weights: &ScriptWeights) -> f64 {
    text.chars().map(|c| char_weight(c, weights)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visualLength_latin_shouldCountCharacters() {
        assert_eq!(visual_length("hello", &ScriptWeights::default()), 5.0);
    }

    #[test]
    fn test_visualLength_chinese_shouldUseCjkWeight() {
        assert_eq!(visual_length("你好", &ScriptWeights::default()), 3.5);
    }

    #[test]
    fn test_visualLength_customWeights_shouldApply() {
        let weights = ScriptWeights {
            cjk: 2.5,
            ..ScriptWeights::default()
        };
        assert_eq!(visual_length("你好!", &weights), 6.0);
        assert_eq!(visual_length("안녕", &weights), 3.0);
        assert_eq!(visual_length("！", &weights), 1.75);
    }
}
