//! JSON extraction stages and step-shape normalization
//!
//! Agents are asked for `{"title": ..., "steps": [...]}` but the steps come
//! back in several shapes. Each array element is classified into a
//! [`StepShape`] by trying the known shapes in `SHAPE_ORDER`; an
//! element matching none of them keeps its JSON text as content.

use super::DraftStep;
use crate::sequence::StepContent;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("code fence regex must compile")
});

static NESTED_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*step\s*\d+\s*$").expect("nested step key regex must compile"));

/// `(title, steps)` recovered from a JSON payload
pub(super) type JsonRecovery = (Option<String>, Vec<DraftStep>);

/// Stage 1: a JSON object in a code fence or embedded in prose
pub(super) fn embedded(raw: &str) -> Option<JsonRecovery> {
    candidates(raw).into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => decode_payload(&value),
            Err(e) => {
                tracing::debug!(error = %e, "Embedded JSON candidate did not parse");
                None
            }
        }
    })
}

/// Stage 2: the whole trimmed reply as JSON.
///
/// A JSON string is unwrapped once, which covers double-encoded payloads.
pub(super) fn whole(raw: &str) -> Option<JsonRecovery> {
    let value = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Reply is not JSON");
            return None;
        }
    };

    match value {
        Value::String(inner) => serde_json::from_str::<Value>(inner.trim())
            .ok()
            .and_then(|inner| decode_payload(&inner)),
        other => decode_payload(&other),
    }
}

/// Substrings that might hold the payload, most specific first
fn candidates(raw: &str) -> Vec<&str> {
    let mut found: Vec<&str> = FENCE_RE
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| body.starts_with('{'))
        .collect();

    if let Some(balanced) = balanced_object(raw) {
        found.push(balanced);
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if let Some(span) = raw.get(start..=end) {
            found.push(span);
        }
    }

    found.dedup();
    found
}

/// The object starting at the first `{`, closed by its matching `}`
fn balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw.get(start..)?.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return raw.get(start..=start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Shape check: an object exposing a non-empty `steps` array
fn decode_payload(value: &Value) -> Option<JsonRecovery> {
    let object = value.as_object()?;
    let steps = object.get("steps")?.as_array()?;
    if steps.is_empty() {
        tracing::debug!("JSON payload has an empty steps array");
        return None;
    }

    let title = payload_title(object);

    let drafts = steps
        .iter()
        .enumerate()
        .map(|(index, element)| StepShape::classify(element, index).into_draft(element))
        .collect();

    Some((title, drafts))
}

/// Title of a payload whose `steps` array is present but empty.
///
/// Such a payload fails the shape check, but its title is still the best
/// name for whatever the later stages recover.
pub(super) fn stepless_title(raw: &str) -> Option<String> {
    candidates(raw)
        .into_iter()
        .chain(std::iter::once(raw.trim()))
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .map(|value| match value {
            Value::String(inner) => serde_json::from_str(inner.trim()).unwrap_or(Value::Null),
            other => other,
        })
        .find_map(|value| {
            let object = value.as_object()?;
            object.get("steps")?.as_array().filter(|steps| steps.is_empty())?;
            payload_title(object)
        })
}

fn payload_title(object: &Map<String, Value>) -> Option<String> {
    object
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
}

/// The shapes a step element can take
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepShape<'a> {
    /// `"Send an intro email"`
    Text(&'a str),
    /// `{"Content": "...", "Strategy": "...", "stepNumber": 2}`
    Direct {
        content: &'a str,
        strategy: Option<&'a str>,
    },
    /// `{"Step 1": {"Content": "...", "Strategy": "..."}}`
    Nested {
        content: &'a str,
        strategy: Option<&'a str>,
    },
    Unrecognized,
}

type ShapeDecoder = for<'a> fn(&'a Value, usize) -> Option<StepShape<'a>>;

/// Tried in order; explicit content fields win over the nested form
const SHAPE_ORDER: [ShapeDecoder; 3] = [text_shape, direct_shape, nested_shape];

fn text_shape(element: &Value, _index: usize) -> Option<StepShape<'_>> {
    element.as_str().map(StepShape::Text)
}

fn direct_shape(element: &Value, _index: usize) -> Option<StepShape<'_>> {
    let object = element.as_object()?;
    let content = string_field(object, &["Content", "content"])?;
    Some(StepShape::Direct {
        content,
        strategy: string_field(object, &["Strategy", "strategy"]),
    })
}

fn nested_shape(element: &Value, index: usize) -> Option<StepShape<'_>> {
    let object = element.as_object()?;
    let positional_key = format!("Step {}", index + 1);
    let inner = object.get(&positional_key).or_else(|| {
        object
            .iter()
            .find(|(key, _)| NESTED_KEY_RE.is_match(key))
            .map(|(_, value)| value)
    })?;

    match inner {
        Value::String(content) => Some(StepShape::Nested {
            content: content.as_str(),
            strategy: None,
        }),
        Value::Object(fields) => Some(StepShape::Nested {
            content: string_field(fields, &["Content", "content"]).unwrap_or(""),
            strategy: string_field(fields, &["Strategy", "strategy"]),
        }),
        _ => None,
    }
}

impl<'a> StepShape<'a> {
    fn classify(element: &'a Value, index: usize) -> Self {
        SHAPE_ORDER
            .iter()
            .find_map(|decode| decode(element, index))
            .unwrap_or(StepShape::Unrecognized)
    }

    fn into_draft(self, element: &Value) -> DraftStep {
        let content = match self {
            StepShape::Text(text) => text.to_string(),
            StepShape::Direct { content, strategy } | StepShape::Nested { content, strategy } => {
                StepContent::compose(content, strategy)
            }
            StepShape::Unrecognized => {
                tracing::debug!("Unrecognized step shape, keeping raw JSON");
                element.to_string()
            }
        };

        DraftStep {
            content,
            step_number: explicit_step_number(element),
        }
    }
}

fn string_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| object.get(*key).and_then(Value::as_str))
}

/// A positive integer `stepNumber` on the element itself
fn explicit_step_number(element: &Value) -> Option<u32> {
    element
        .get("stepNumber")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}
