use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::errors::ValidationError;

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Pull the JSON object out of a model answer
///
/// Handles bare objects, fenced ```json blocks, plain fences and
/// prose around a single object.
pub fn extract_json(response: &str) -> Result<&str, ValidationError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    if trimmed.starts_with('{') {
        // Drop anything the model wrote after the object
        return Ok(match trimmed.rfind('}') {
            Some(end) => &trimmed[..=end],
            None => trimmed,
        });
    }

    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            return Ok(trimmed[start + 7..start + 7 + end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let json = trimmed[start + 3..start + 3 + end].trim();
            if json.starts_with('{') {
                return Ok(json);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return Ok(&trimmed[start..=end]);
        }
    }

    Err(ValidationError::MalformedJson(
        "no JSON object found in response".to_string(),
    ))
}

/// Parse a model answer into `T`, tolerating trailing commas
pub fn parse_response<T: DeserializeOwned>(response: &str) -> Result<T, ValidationError> {
    let json = extract_json(response)?;
    match serde_json::from_str::<T>(json) {
        Ok(value) => Ok(value),
        Err(first) => {
            let repaired = TRAILING_COMMA.replace_all(json, "$1");
            serde_json::from_str::<T>(&repaired)
                .map_err(|_| ValidationError::MalformedJson(first.to_string()))
        }
    }
}
