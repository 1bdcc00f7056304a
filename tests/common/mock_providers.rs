/*!
 * Scripted answers for the completion calls of the pipeline
 *
 * Every responder reads the `### Input` JSON block of the prompt and
 * answers in the shape the matching schema expects, so tests never touch
 * a real completion service.
 */

use serde_json::{json, Map, Value};

use dubsync::providers::mock::MockProvider;
use dubsync::providers::CompletionRequest;

/// The JSON object embedded under `### Input`
pub fn input_json(prompt: &str) -> Value {
    let start = prompt.find("### Input").unwrap_or(0);
    let block = &prompt[start..];
    let open = block.find("```json").map(|i| i + 7).unwrap_or(0);
    let close = block[open..].find("```").map(|i| open + i).unwrap_or(block.len());
    serde_json::from_str(block[open..close].trim()).unwrap_or(Value::Null)
}

/// Split every sentence at its middle word
fn split_answer(input: &Value) -> Value {
    let mut output = Map::new();
    for (id, item) in input.as_object().into_iter().flatten() {
        let words: Vec<&str> = item["sentence"].as_str().unwrap_or_default().split(' ').collect();
        let middle = words.len() / 2;
        let split = format!("{}[br]{}", words[..middle].join(" "), words[middle..].join(" "));
        output.insert(id.clone(), json!({"analysis": "middle", "split": split}));
    }
    Value::Object(output)
}

/// Fixed theme with one term for the sample transcript
fn summary_answer() -> Value {
    json!({
        "theme": "Two people greet each other.",
        "terms": [{"src": "world", "tgt": "WORLD", "note": "the planet"}],
    })
}

/// Uppercase the source line as its literal translation
fn faithful_answer(input: &Value) -> Value {
    let mut output = Map::new();
    for (id, origin) in input.as_object().into_iter().flatten() {
        let origin = origin.as_str().unwrap_or_default();
        output.insert(
            id.clone(),
            json!({"id": id, "origin": origin, "direct": origin.to_uppercase()}),
        );
    }
    Value::Object(output)
}

/// Keep the literal translation as the free one
fn expressive_answer(input: &Value) -> Value {
    let mut output = Map::new();
    for (id, item) in input.as_object().into_iter().flatten() {
        output.insert(
            id.clone(),
            json!({
                "id": id,
                "origin": item["origin"],
                "direct": item["direct"],
                "reflect": "reads fine",
                "free": item["direct"],
            }),
        );
    }
    Value::Object(output)
}

/// Cut the translation into as many runs as there are source parts
///
/// Spaced text is cut between words, anything else between characters.
fn align_answer(input: &Value) -> Value {
    let parts = input["source_parts"].as_array().map(Vec::len).unwrap_or(1).max(1);
    let translation = input["translation"].as_str().unwrap_or_default();
    let (units, joiner): (Vec<String>, &str) = if translation.contains(' ') {
        (translation.split_whitespace().map(str::to_string).collect(), " ")
    } else {
        (translation.chars().map(String::from).collect(), "")
    };
    let size = units.len().div_ceil(parts).max(1);

    let align: Vec<Value> = (0..parts)
        .map(|index| {
            let from = (index * size).min(units.len());
            let to = ((index + 1) * size).min(units.len());
            let mut item = Map::new();
            item.insert(format!("src_part_{}", index + 1), Value::String(String::new()));
            item.insert(format!("target_part_{}", index + 1), Value::String(units[from..to].join(joiner)));
            Value::Object(item)
        })
        .collect();
    json!({"analysis": "even", "align": align})
}

/// Keep the first quarter of every line
fn trim_answer(input: &Value) -> Value {
    let mut output = Map::new();
    for (id, item) in input.as_object().into_iter().flatten() {
        let text: Vec<char> = item["text"].as_str().unwrap_or_default().chars().collect();
        let short: String = text[..text.len().div_ceil(4)].iter().collect();
        output.insert(id.clone(), Value::String(short));
    }
    Value::Object(output)
}

/// Answers every request title the pipeline sends
pub fn pipeline_responder(request: &CompletionRequest) -> String {
    let input = input_json(&request.prompt);
    let answer = match request.title.as_str() {
        "summarize" => summary_answer(),
        "split_by_meaning" => split_answer(&input),
        "translate_faithfulness" => faithful_answer(&input),
        "translate_expressiveness" => expressive_answer(&input),
        "align_subs" => align_answer(&input),
        "trim_subs" => trim_answer(&input),
        _ => Value::Object(Map::new()),
    };
    answer.to_string()
}

/// Mock provider running the full pipeline responder
pub fn pipeline_provider() -> MockProvider {
    MockProvider::working(pipeline_responder)
}
