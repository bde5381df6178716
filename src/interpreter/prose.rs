//! Prose extraction stages for replies that carry no usable JSON

use super::{DraftStep, InterpreterOptions};
use regex::Regex;
use std::sync::LazyLock;

static NUMBERED_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\d+\.[ \t]+").expect("numbered marker regex must compile"));

static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("paragraph break regex must compile"));

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?]+)\s+").expect("sentence end regex must compile"));

static SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)subject:[ \t]*([^\r\n]+)").expect("subject regex must compile"));

/// Stage 3: `1. foo 2. bar` items. Needs at least two non-empty items.
///
/// An item runs until the next marker or the first blank line, whichever
/// comes first.
pub(super) fn numbered_list(raw: &str) -> Option<Vec<DraftStep>> {
    let markers: Vec<regex::Match<'_>> = NUMBERED_MARKER_RE.find_iter(raw).collect();
    if markers.len() < 2 {
        return None;
    }

    let items: Vec<DraftStep> = markers
        .iter()
        .enumerate()
        .filter_map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(raw.len(), regex::Match::start);
            let segment = raw.get(marker.end()..end)?;
            let segment = PARAGRAPH_BREAK_RE.split(segment).next().unwrap_or(segment).trim();
            (!segment.is_empty()).then(|| DraftStep::positional(segment))
        })
        .collect();

    (items.len() >= 2).then_some(items)
}

/// Stage 4: significant blank-line separated paragraphs, capped
pub(super) fn paragraphs(raw: &str, options: &InterpreterOptions) -> Vec<DraftStep> {
    PARAGRAPH_BREAK_RE
        .split(raw)
        .map(str::trim)
        .filter(|p| is_significant(p, options))
        .take(options.max_prose_steps)
        .map(DraftStep::positional)
        .collect()
}

/// Stage 5: significant sentences, capped. Terminal punctuation is kept.
pub(super) fn sentences(raw: &str, options: &InterpreterOptions) -> Vec<DraftStep> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for caps in SENTENCE_END_RE.captures_iter(raw) {
        let (Some(whole), Some(punct)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Some(piece) = raw.get(start..punct.end()) {
            pieces.push(piece);
        }
        start = whole.end();
    }
    if let Some(rest) = raw.get(start..) {
        pieces.push(rest);
    }

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|s| is_significant(s, options))
        .take(options.max_prose_steps)
        .map(DraftStep::positional)
        .collect()
}

/// Title from a `Subject: ...` line, if any
pub(super) fn subject_title(raw: &str) -> Option<String> {
    SUBJECT_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn is_significant(text: &str, options: &InterpreterOptions) -> bool {
    text.chars().count() > options.min_significant_chars
}
