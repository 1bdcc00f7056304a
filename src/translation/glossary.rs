/*!
 * Transcript theme and terminology shared by every translation chunk.
 *
 * The theme comes from one summary call over the start of the transcript.
 * Configured terms are always kept; extracted terms only add sources that
 * are not configured yet.
 */

use serde::{Deserialize, Serialize};

use crate::completion::{SummaryResponse, Term};
use crate::segmentation::SentenceRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Glossary {
    pub theme: Option<String>,
    pub terms: Vec<Term>,
}

impl Glossary {
    /// Configured terms only, no theme
    pub fn from_terms(custom: &[Term]) -> Self {
        Self {
            theme: None,
            terms: custom.to_vec(),
        }
    }

    /// Configured terms followed by the new ones from `summary`
    pub fn merge(custom: &[Term], summary: &SummaryResponse) -> Self {
        let mut glossary = Self::from_terms(custom);
        glossary.theme = Some(summary.theme()).filter(|theme| !theme.is_empty());
        for term in &summary.terms {
            let known = glossary
                .terms
                .iter()
                .any(|existing| existing.src.trim().eq_ignore_ascii_case(term.src.trim()));
            if !known {
                glossary.terms.push(term.clone());
            }
        }
        glossary
    }

    /// Terms whose source occurs in `text`, ignoring case
    pub fn matching(&self, text: &str) -> Vec<&Term> {
        let haystack = text.to_lowercase();
        self.terms
            .iter()
            .filter(|term| {
                let needle = term.src.trim().to_lowercase();
                !needle.is_empty() && haystack.contains(&needle)
            })
            .collect()
    }
}

/// Sentence texts joined by spaces, cut at `max_chars` characters
pub fn summary_source(records: &[SentenceRecord], max_chars: usize) -> String {
    let mut content = String::new();
    let mut count = 0;
    for record in records {
        let separator = usize::from(!content.is_empty());
        let length = record.text.chars().count();
        if count + separator + length > max_chars {
            let room = max_chars.saturating_sub(count + separator);
            if room > 0 {
                if separator == 1 {
                    content.push(' ');
                }
                content.extend(record.text.chars().take(room));
            }
            break;
        }
        if separator == 1 {
            content.push(' ');
        }
        content.push_str(&record.text);
        count += separator + length;
    }
    content
}
