/*!
 * Typed response schemas for every completion call.
 *
 * Each call kind deserializes into its own type and exposes a pure
 * `validate` function; the client retries whenever validation fails.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ValidationError;

/// Id echoed back by the model, either as a number or as a string
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseId {
    Number(u64),
    Text(String),
}

impl ResponseId {
    pub fn as_string(&self) -> String {
        match self {
            ResponseId::Number(n) => n.to_string(),
            ResponseId::Text(s) => s.trim().to_string(),
        }
    }
}

/// Keys must be exactly the expected ids
fn check_id_set<'a>(
    keys: impl Iterator<Item = &'a String>,
    expected: &[u64],
) -> Result<(), ValidationError> {
    let present: BTreeSet<String> = keys.map(|k| k.trim().to_string()).collect();
    let wanted: BTreeSet<String> = expected.iter().map(|id| id.to_string()).collect();

    let missing: Vec<String> = wanted.difference(&present).cloned().collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingIds(missing));
    }
    let unexpected: Vec<String> = present.difference(&wanted).cloned().collect();
    if !unexpected.is_empty() {
        return Err(ValidationError::UnexpectedIds(unexpected));
    }
    Ok(())
}

/// Keys must include every expected id; extra keys are tolerated
fn check_ids_present<'a>(
    keys: impl Iterator<Item = &'a String>,
    expected: &[u64],
) -> Result<(), ValidationError> {
    let present: BTreeSet<String> = keys.map(|k| k.trim().to_string()).collect();
    let missing: Vec<String> = expected
        .iter()
        .map(|id| id.to_string())
        .filter(|id| !present.contains(id))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingIds(missing))
    }
}

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, id: u64) -> Option<&'a T> {
    let key = id.to_string();
    map.get(&key)
        .or_else(|| map.iter().find(|(k, _)| k.trim() == key).map(|(_, v)| v))
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

/// One line of the faithful pass
#[derive(Debug, Clone, Deserialize)]
pub struct FaithfulLine {
    #[serde(default)]
    pub id: Option<ResponseId>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub direct: Option<String>,
}

/// `{id: {id, origin, direct}}`
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct FaithfulTranslation(pub BTreeMap<String, FaithfulLine>);

impl FaithfulTranslation {
    pub fn validate(&self, expected: &[u64]) -> Result<(), ValidationError> {
        check_id_set(self.0.keys(), expected)?;
        for (key, line) in &self.0 {
            check_echoed_id(key, line.id.as_ref())?;
            if line.direct.is_none() {
                return Err(ValidationError::MissingField {
                    id: key.clone(),
                    field: "direct".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Literal translation for `id`, flattened to one line
    pub fn direct(&self, id: u64) -> Option<String> {
        lookup(&self.0, id)
            .and_then(|line| line.direct.as_deref())
            .map(single_line)
    }
}

/// One line of the expressive pass
#[derive(Debug, Clone, Deserialize)]
pub struct ExpressiveLine {
    #[serde(default)]
    pub id: Option<ResponseId>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub direct: Option<String>,
    #[serde(default)]
    pub reflect: Option<String>,
    #[serde(default)]
    pub free: Option<String>,
}

/// `{id: {id, origin, direct, reflect, free}}`
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct ExpressiveTranslation(pub BTreeMap<String, ExpressiveLine>);

impl ExpressiveTranslation {
    pub fn validate(&self, expected: &[u64]) -> Result<(), ValidationError> {
        check_id_set(self.0.keys(), expected)?;
        for (key, line) in &self.0 {
            check_echoed_id(key, line.id.as_ref())?;
            if line.free.is_none() {
                return Err(ValidationError::MissingField {
                    id: key.clone(),
                    field: "free".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Final free translation for `id`, flattened to one line
    pub fn free(&self, id: u64) -> Option<String> {
        lookup(&self.0, id)
            .and_then(|line| line.free.as_deref())
            .map(single_line)
    }
}

fn check_echoed_id(key: &str, id: Option<&ResponseId>) -> Result<(), ValidationError> {
    match id {
        None => Err(ValidationError::MissingField {
            id: key.to_string(),
            field: "id".to_string(),
        }),
        Some(found) if found.as_string() != key.trim() => Err(ValidationError::IdMismatch {
            key: key.to_string(),
            found: found.as_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// One sentence of a split answer
#[derive(Debug, Clone, Deserialize)]
pub struct SplitItem {
    #[serde(default)]
    pub analysis: Option<Value>,
    #[serde(default)]
    pub split: Option<String>,
}

/// `{id: {analysis, split}}` where `split` carries the delimiter
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SplitResponse(pub BTreeMap<String, SplitItem>);

impl SplitResponse {
    pub fn validate(&self, expected: &[u64], delimiter: &str) -> Result<(), ValidationError> {
        check_ids_present(self.0.keys(), expected)?;
        for id in expected {
            let split = lookup(&self.0, *id).and_then(|item| item.split.as_deref());
            match split {
                None => {
                    return Err(ValidationError::MissingField {
                        id: id.to_string(),
                        field: "split".to_string(),
                    });
                }
                Some(text) if !text.contains(delimiter) => {
                    return Err(ValidationError::MissingDelimiter(id.to_string()));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn split(&self, id: u64) -> Option<&str> {
        lookup(&self.0, id).and_then(|item| item.split.as_deref())
    }
}

/// `{analysis, align: [{src_part_1, target_part_1}, ...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct AlignResponse {
    #[serde(default)]
    pub analysis: Option<Value>,
    #[serde(default)]
    pub align: Vec<BTreeMap<String, Value>>,
}

impl AlignResponse {
    pub fn validate(&self, expected_parts: usize) -> Result<(), ValidationError> {
        if self.align.len() != expected_parts {
            return Err(ValidationError::PartCountMismatch {
                expected: expected_parts,
                actual: self.align.len(),
            });
        }
        for (index, part) in self.align.iter().enumerate() {
            let key = format!("target_part_{}", index + 1);
            if !part.get(&key).is_some_and(Value::is_string) {
                return Err(ValidationError::MissingField {
                    id: (index + 1).to_string(),
                    field: key,
                });
            }
        }
        Ok(())
    }

    /// Target parts in order; only meaningful after `validate`
    pub fn target_parts(&self) -> Vec<String> {
        self.align
            .iter()
            .enumerate()
            .map(|(index, part)| {
                part.get(&format!("target_part_{}", index + 1))
                    .and_then(Value::as_str)
                    .map(single_line)
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// `{id: shortened_text}`
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct TrimResponse(pub BTreeMap<String, Value>);

impl TrimResponse {
    pub fn validate(&self, expected: &[u64]) -> Result<(), ValidationError> {
        check_ids_present(self.0.keys(), expected)?;
        for id in expected {
            if !lookup(&self.0, *id).is_some_and(Value::is_string) {
                return Err(ValidationError::MissingField {
                    id: id.to_string(),
                    field: "text".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn text(&self, id: u64) -> Option<String> {
        lookup(&self.0, id).and_then(Value::as_str).map(single_line)
    }
}

/// One glossary entry: source term, its rendering, and a short note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub src: String,
    pub tgt: String,
    #[serde(default)]
    pub note: String,
}

/// `{theme, terms: [{src, tgt, note}]}`
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl SummaryResponse {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.theme.trim().is_empty() {
            return Err(ValidationError::MissingField {
                id: "summary".to_string(),
                field: "theme".to_string(),
            });
        }
        if let Some(index) = self.terms.iter().position(|term| term.src.trim().is_empty()) {
            return Err(ValidationError::MissingField {
                id: format!("terms[{}]", index),
                field: "src".to_string(),
            });
        }
        Ok(())
    }

    pub fn theme(&self) -> String {
        single_line(&self.theme)
    }
}
