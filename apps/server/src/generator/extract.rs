//! Pulls structured content out of free-form model output.
//!
//! Models wrap their JSON in different ways. After control characters are
//! removed, the candidates below are tried in order and the first one that
//! parses as a JSON object is used:
//!
//! 1. the whole text
//! 2. the first ```` ```json ```` fenced block
//! 3. the first plain ```` ``` ```` fenced block
//! 4. the span from the first `{` to the last `}`

use serde_json::Value;

use super::GeneratorError;
use crate::models::{Content, Section};

const FENCE: &str = "```";

/// Which strategy located the JSON object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Direct,
    LabeledFence,
    PlainFence,
    BraceSpan,
}

/// Removes control characters. Line breaks and tabs become spaces so that
/// raw newlines inside JSON strings do not break parsing or glue words.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

fn labeled_fence(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    Some(&rest[..end])
}

fn plain_fence(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    let inner = rest[..end].trim_start();
    // Skip an info string such as "javascript" in front of the object
    let body_start = inner.find(['{', '['])?;
    Some(&inner[body_start..])
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Finds the first JSON object in `text`, reporting which strategy matched
pub fn locate_object(text: &str) -> Option<(ExtractionStrategy, Value)> {
    let candidates: [(ExtractionStrategy, Option<&str>); 4] = [
        (ExtractionStrategy::Direct, Some(text)),
        (ExtractionStrategy::LabeledFence, labeled_fence(text)),
        (ExtractionStrategy::PlainFence, plain_fence(text)),
        (ExtractionStrategy::BraceSpan, brace_span(text)),
    ];

    candidates.into_iter().find_map(|(strategy, candidate)| {
        candidate
            .and_then(parse_object)
            .map(|value| (strategy, value))
    })
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Converts a located object into content, requiring a title and a body.
/// Sections missing either field are dropped.
pub fn content_from_value(value: &Value) -> Result<Content, GeneratorError> {
    let title = text_field(value, &["title"])
        .ok_or_else(|| GeneratorError::malformed("generated object has no title"))?;
    let body = text_field(value, &["content", "body"])
        .ok_or_else(|| GeneratorError::malformed("generated object has no content"))?;

    let sections = value
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(Section {
                        title: text_field(item, &["title"])?,
                        body: text_field(item, &["content", "body"])?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Content {
        title,
        body,
        sections,
    })
}

/// Extracts content from raw model output
pub fn extract_content(raw: &str) -> Result<Content, GeneratorError> {
    let cleaned = strip_control_chars(raw);
    let (strategy, value) = locate_object(&cleaned).ok_or_else(|| {
        GeneratorError::malformed("no JSON object found in generator response")
    })?;

    log::debug!("Located generated object via {:?}", strategy);
    content_from_value(&value)
}
