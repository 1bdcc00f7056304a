/*!
 * Prompt templates for the completion calls of the pipeline.
 *
 * Every prompt ends with an `### Input` JSON block and an `### Output Format`
 * JSON block spelling out every id the answer must contain.
 */

use serde_json::{json, Value};

use crate::completion::Term;

/// Template with `{placeholder}` variables
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const SPLIT: &'static str = r#"## Role
You are a professional Netflix subtitle splitter in **{language}**.

## Task
Split each sentence of the input into the requested number of parts.
1. Each part should be shorter than {max_length} words where possible
2. Keep every part meaningful and coherent on its own
3. Prefer splitting at punctuation, conjunctions or clause boundaries
4. Parts should be of similar length
5. Do NOT add, remove or reorder any words

Mark every split with `{delimiter}`.

### Input
```json
{input}
```

### Output Format
Return only JSON:
```json
{output}
```
"#;

    pub const FAITHFUL: &'static str = r#"## Role
You are a professional Netflix subtitle translator, fluent in both {source_language} and {target_language}.

## Task
Translate each line of the input from {source_language} to {target_language}, one translation per id.
1. Translate line by line; do not merge or split lines
2. Keep the meaning exact; do not add or omit information
3. The `[speaker]:` prefix only tells you who is talking; never translate or repeat it
4. Use the context lines only for understanding

{context}
### Input
```json
{input}
```

### Output Format
Return only JSON:
```json
{output}
```
"#;

    pub const EXPRESSIVE: &'static str = r#"## Role
You are a professional Netflix subtitle translator and language consultant for {target_language}.

## Task
Each line below already has a literal translation in `direct`. Rewrite it so it reads naturally in {target_language}.
1. Note in `reflect` what makes the literal version unnatural
2. Write the improved translation in `free`
3. Keep the meaning and the id of every line; do not merge lines

{context}
### Input
```json
{input}
```

### Output Format
Return only JSON:
```json
{output}
```
"#;

    pub const ALIGN: &'static str = r#"## Role
You are a Netflix subtitle alignment expert fluent in {source_language} and {target_language}.

## Task
The {source_language} line below was split into {part_count} parts. Split its {target_language} translation into exactly {part_count} matching parts.
1. Every target part must correspond to the source part with the same number
2. Do not change the wording of the translation beyond where it is split
3. Do not leave any target part empty

### Input
```json
{input}
```

### Output Format
Return only JSON:
```json
{output}
```
"#;

    pub const TRIM: &'static str = r#"## Role
You are a professional subtitle editor for {target_language}.

## Task
Each line below is too long to be spoken in its time slot. Shorten every line so it can be read aloud within its duration.
1. Keep the core meaning; drop filler, repetition and asides
2. Keep the text in {target_language}
3. Return one shortened line per id

### Input
```json
{input}
```

### Output Format
Return only JSON:
```json
{output}
```
"#;

    pub const SUMMARY: &'static str = r#"## Role
You are a video translation expert and terminology consultant, fluent in {source_language} and {target_language}.

## Task
For the {source_language} transcript in the input:
1. Summarize the main topic in two sentences: the first for the topic, the second for the key point
2. Extract fewer than 15 professional terms and names, each with its {target_language} translation or the original when it should stay untranslated
3. Give a brief explanation for each term
4. Skip every term already listed under `existing_terms`

### Input
```json
{input}
```

### Output Format
Return only JSON:
```json
{output}
```
"#;

    pub fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Render the template, replacing each `{name}` with its value
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        let mut rendered = self.template.to_string();
        for (name, value) in variables {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }
        rendered
    }
}

/// Pretty JSON object text with keys in the given order
pub fn ordered_object<I>(entries: I) -> String
where
    I: IntoIterator<Item = (String, Value)>,
{
    let body: Vec<String> = entries
        .into_iter()
        .map(|(key, value)| {
            let key = Value::String(key).to_string();
            let value = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| value.to_string())
                .replace('\n', "\n  ");
            format!("  {}: {}", key, value)
        })
        .collect();
    if body.is_empty() {
        "{}".to_string()
    } else {
        format!("{{\n{}\n}}", body.join(",\n"))
    }
}

/// One sentence to split
#[derive(Debug, Clone)]
pub struct SplitItem<'a> {
    pub id: u64,
    pub sentence: &'a str,
    pub parts: usize,
}

pub fn split_prompt(items: &[SplitItem<'_>], language: &str, max_length: usize, delimiter: &str) -> String {
    let input = ordered_object(items.iter().map(|item| {
        (
            item.id.to_string(),
            json!({"sentence": item.sentence, "num_parts": item.parts}),
        )
    }));
    let output = ordered_object(items.iter().map(|item| {
        let example = vec!["part"; item.parts].join(delimiter);
        (
            item.id.to_string(),
            json!({"analysis": "Brief analysis of where to split", "split": example}),
        )
    }));
    PromptTemplate::new(PromptTemplate::SPLIT).render(&[
        ("language", language),
        ("max_length", &max_length.to_string()),
        ("delimiter", delimiter),
        ("input", &input),
        ("output", &output),
    ])
}

/// Context lines shown around a chunk
#[derive(Debug, Clone, Default)]
pub struct ChunkContext<'a> {
    pub previous: Option<&'a [String]>,
    pub next: Option<&'a [String]>,
    // @field: Two-sentence theme of the whole transcript
    pub summary: Option<&'a str>,
    // @field: Glossary terms that occur in this chunk
    pub notes: Vec<&'a Term>,
}

impl ChunkContext<'_> {
    fn render(&self) -> String {
        let mut text = String::new();
        if let Some(previous) = self.previous.filter(|lines| !lines.is_empty()) {
            text.push_str("### Previous Content\n");
            text.push_str(&previous.join("\n"));
            text.push_str("\n\n");
        }
        if let Some(next) = self.next.filter(|lines| !lines.is_empty()) {
            text.push_str("### Subsequent Content\n");
            text.push_str(&next.join("\n"));
            text.push_str("\n\n");
        }
        if let Some(summary) = self.summary.filter(|summary| !summary.is_empty()) {
            text.push_str("### Content Summary\n");
            text.push_str(summary);
            text.push_str("\n\n");
        }
        if !self.notes.is_empty() {
            text.push_str("### Points to Note\n");
            for (index, term) in self.notes.iter().enumerate() {
                text.push_str(&format!("{}. \"{}\": \"{}\"", index + 1, term.src, term.tgt));
                if !term.note.is_empty() {
                    text.push_str(&format!(", meaning: {}", term.note));
                }
                text.push('\n');
            }
            text.push('\n');
        }
        text
    }
}

pub fn faithful_prompt(
    lines: &[(u64, String)],
    context: &ChunkContext<'_>,
    source_language: &str,
    target_language: &str,
) -> String {
    let input = ordered_object(
        lines
            .iter()
            .map(|(id, text)| (id.to_string(), Value::String(text.clone()))),
    );
    let output = ordered_object(lines.iter().map(|(id, text)| {
        (
            id.to_string(),
            json!({"id": id, "origin": text, "direct": format!("literal {} translation", target_language)}),
        )
    }));
    PromptTemplate::new(PromptTemplate::FAITHFUL).render(&[
        ("source_language", source_language),
        ("target_language", target_language),
        ("context", &context.render()),
        ("input", &input),
        ("output", &output),
    ])
}

/// One line of the expressive pass with its literal translation
#[derive(Debug, Clone)]
pub struct ExpressiveItem<'a> {
    pub id: u64,
    pub origin: &'a str,
    pub direct: &'a str,
}

pub fn expressive_prompt(
    items: &[ExpressiveItem<'_>],
    context: &ChunkContext<'_>,
    source_language: &str,
    target_language: &str,
) -> String {
    let input = ordered_object(items.iter().map(|item| {
        (
            item.id.to_string(),
            json!({"origin": item.origin, "direct": item.direct}),
        )
    }));
    let output = ordered_object(items.iter().map(|item| {
        (
            item.id.to_string(),
            json!({
                "id": item.id,
                "origin": item.origin,
                "direct": item.direct,
                "reflect": "what sounds unnatural",
                "free": format!("natural {} translation", target_language),
            }),
        )
    }));
    PromptTemplate::new(PromptTemplate::EXPRESSIVE).render(&[
        ("source_language", source_language),
        ("target_language", target_language),
        ("context", &context.render()),
        ("input", &input),
        ("output", &output),
    ])
}

pub fn summary_prompt(content: &str, existing: &[Term], source_language: &str, target_language: &str) -> String {
    let existing: Vec<Value> = existing
        .iter()
        .map(|term| json!({"src": term.src, "tgt": term.tgt, "note": term.note}))
        .collect();
    let input = ordered_object(vec![
        ("text".to_string(), Value::String(content.to_string())),
        ("existing_terms".to_string(), Value::Array(existing)),
    ]);
    let output = ordered_object(vec![
        ("theme".to_string(), Value::String("Two-sentence summary".to_string())),
        (
            "terms".to_string(),
            json!([{
                "src": format!("{} term", source_language),
                "tgt": format!("{} translation or original", target_language),
                "note": "Brief explanation",
            }]),
        ),
    ]);
    PromptTemplate::new(PromptTemplate::SUMMARY).render(&[
        ("source_language", source_language),
        ("target_language", target_language),
        ("input", &input),
        ("output", &output),
    ])
}

pub fn align_prompt(
    source: &str,
    translation: &str,
    source_parts: &[String],
    source_language: &str,
    target_language: &str,
) -> String {
    let input = ordered_object(vec![
        ("source".to_string(), Value::String(source.to_string())),
        ("translation".to_string(), Value::String(translation.to_string())),
        (
            "source_parts".to_string(),
            Value::Array(source_parts.iter().cloned().map(Value::String).collect()),
        ),
    ]);
    let align: Vec<Value> = source_parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            let mut item = serde_json::Map::new();
            item.insert(format!("src_part_{}", index + 1), Value::String(part.clone()));
            item.insert(
                format!("target_part_{}", index + 1),
                Value::String(format!("matching {} part", target_language)),
            );
            Value::Object(item)
        })
        .collect();
    let output = ordered_object(vec![
        ("analysis".to_string(), Value::String("Brief alignment analysis".to_string())),
        ("align".to_string(), Value::Array(align)),
    ]);
    PromptTemplate::new(PromptTemplate::ALIGN).render(&[
        ("source_language", source_language),
        ("target_language", target_language),
        ("part_count", &source_parts.len().to_string()),
        ("input", &input),
        ("output", &output),
    ])
}

/// One over-long line to shorten
#[derive(Debug, Clone)]
pub struct TrimItem<'a> {
    pub id: u64,
    pub text: &'a str,
    pub duration: f64,
}

pub fn trim_prompt(items: &[TrimItem<'_>], target_language: &str) -> String {
    let input = ordered_object(items.iter().map(|item| {
        (
            item.id.to_string(),
            json!({"text": item.text, "duration_seconds": (item.duration * 100.0).round() / 100.0}),
        )
    }));
    let output = ordered_object(
        items
            .iter()
            .map(|item| (item.id.to_string(), Value::String("shortened text".to_string()))),
    );
    PromptTemplate::new(PromptTemplate::TRIM).render(&[
        ("target_language", target_language),
        ("input", &input),
        ("output", &output),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_block(prompt: &str) -> Value {
        let start = prompt.find("### Input").unwrap();
        let rest = &prompt[start..];
        let open = rest.find("```json").unwrap() + 7;
        let close = rest[open..].find("```").unwrap();
        serde_json::from_str(&rest[open..open + close]).unwrap()
    }

    #[test]
    fn test_orderedObject_numericKeys_shouldKeepInsertionOrder() {
        let text = ordered_object(vec![
            ("2".to_string(), json!("b")),
            ("10".to_string(), json!("c")),
        ]);
        assert!(text.find("\"2\"").unwrap() < text.find("\"10\"").unwrap());
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["10"], "c");
    }

    #[test]
    fn test_splitPrompt_shouldEmbedIdsAndDelimiter() {
        let items = [SplitItem { id: 7, sentence: "a long sentence", parts: 2 }];
        let prompt = split_prompt(&items, "English", 20, "[br]");
        assert!(prompt.contains("part[br]part"));
        assert_eq!(input_block(&prompt)["7"]["num_parts"], 2);
        assert!(!prompt.contains("{input}"));
    }

    #[test]
    fn test_faithfulPrompt_withContext_shouldRenderSections() {
        let previous = vec!["[A]: before".to_string()];
        let context = ChunkContext {
            previous: Some(&previous),
            ..ChunkContext::default()
        };
        let lines = vec![(1, "[A]: hello".to_string())];
        let prompt = faithful_prompt(&lines, &context, "English", "Chinese");
        assert!(prompt.contains("### Previous Content\n[A]: before"));
        assert!(!prompt.contains("### Subsequent Content"));
        assert_eq!(input_block(&prompt)["1"], "[A]: hello");
    }

    #[test]
    fn test_faithfulPrompt_summaryAndNotes_shouldRenderBeforeInput() {
        let term = Term {
            src: "Falcon".to_string(),
            tgt: "猎鹰".to_string(),
            note: "rocket family".to_string(),
        };
        let context = ChunkContext {
            summary: Some("A launch review."),
            notes: vec![&term],
            ..ChunkContext::default()
        };
        let lines = vec![(1, "[A]: Falcon flew".to_string())];
        let prompt = faithful_prompt(&lines, &context, "English", "Chinese");
        assert!(prompt.contains("### Content Summary\nA launch review."));
        assert!(prompt.contains("### Points to Note\n1. \"Falcon\": \"猎鹰\", meaning: rocket family"));
        assert!(prompt.find("### Points to Note").unwrap() < prompt.find("### Input").unwrap());
        assert_eq!(input_block(&prompt)["1"], "[A]: Falcon flew");
    }

    #[test]
    fn test_summaryPrompt_shouldListExistingTerms() {
        let existing = [Term {
            src: "CNN".to_string(),
            tgt: "CNN".to_string(),
            note: String::new(),
        }];
        let prompt = summary_prompt("some text", &existing, "English", "Chinese");
        let input = input_block(&prompt);
        assert_eq!(input["text"], "some text");
        assert_eq!(input["existing_terms"][0]["src"], "CNN");
        assert!(prompt.contains("\"theme\""));
    }

    #[test]
    fn test_alignPrompt_shouldListEveryTargetPart() {
        let parts = vec!["one".to_string(), "two".to_string()];
        let prompt = align_prompt("one two", "一 二", &parts, "English", "Chinese");
        assert!(prompt.contains("target_part_1"));
        assert!(prompt.contains("target_part_2"));
        assert_eq!(input_block(&prompt)["source_parts"][1], "two");
    }

    #[test]
    fn test_trimPrompt_shouldRoundDuration() {
        let items = [TrimItem { id: 3, text: "long line", duration: 1.23456 }];
        let prompt = trim_prompt(&items, "Chinese");
        assert_eq!(input_block(&prompt)["3"]["duration_seconds"], 1.23);
    }
}
