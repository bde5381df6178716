//! Canonical text encoding of a sequence
//!
//! ```text
//! Title: <title>
//!
//! Step 1: <content>
//!
//! Step 2: <content>
//! ```
//!
//! Blocks are separated by a blank line, so step content must not contain
//! `"\n\n"` or the text no longer decodes to the same steps.

use super::{Sequence, SequenceStep};
use regex::Regex;
use std::sync::LazyLock;

/// Title used when saved text has no `Title:` line
pub const SAVED_DEFAULT_TITLE: &str = "Loaded Sequence";

const BLOCK_SEPARATOR: &str = "\n\n";
const TITLE_PREFIX: &str = "Title:";

static STEP_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*Step\s+(\d+):(.*)$").expect("step block regex must compile")
});

/// Encode steps only, one `Step N: content` block per step
pub fn encode_steps(steps: &[SequenceStep]) -> String {
    steps
        .iter()
        .map(|step| format!("Step {}: {}", step.step_number, step.content))
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Encode a sequence with its leading `Title:` line
pub fn encode(sequence: &Sequence) -> String {
    let steps = encode_steps(&sequence.steps);
    if steps.is_empty() {
        format!("{TITLE_PREFIX} {}", sequence.title)
    } else {
        format!("{TITLE_PREFIX} {}{BLOCK_SEPARATOR}{steps}", sequence.title)
    }
}

/// Decoded form of saved text, before it is bound to a sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSequence {
    pub title: Option<String>,
    /// `(block index, step number, content)`
    pub steps: Vec<(usize, u32, String)>,
}

/// Parse canonical text. Blocks that are not `Step N:` lines are skipped.
pub fn decode(text: &str) -> DecodedSequence {
    let mut blocks: Vec<&str> = text.split(BLOCK_SEPARATOR).collect();

    let mut title = None;
    if let Some(first) = blocks.first() {
        if let Some(rest) = first.trim_start().strip_prefix(TITLE_PREFIX) {
            title = Some(rest.trim().to_string());
            blocks.remove(0);
        }
    }

    let steps = blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| !block.trim().is_empty())
        .filter_map(|(index, block)| {
            let caps = STEP_BLOCK_RE.captures(block)?;
            let step_number = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let content = caps.get(2)?.as_str().trim().to_string();
            Some((index, step_number, content))
        })
        .collect();

    DecodedSequence { title, steps }
}

/// Rebuild a sequence from text saved under `saved_id`.
///
/// Text that does not follow the encoding degrades to one step holding the
/// whole text.
pub fn decode_saved(saved_id: &str, text: &str) -> Sequence {
    let decoded = decode(text);
    let mut steps: Vec<SequenceStep> = decoded
        .steps
        .into_iter()
        .map(|(index, step_number, content)| {
            SequenceStep::new(format!("saved_{saved_id}_step_{index}"), step_number, content)
        })
        .collect();

    if steps.is_empty() {
        tracing::warn!(saved_id, "Saved sequence text is not in step format, loading as one step");
        steps.push(SequenceStep::new(format!("saved_{saved_id}_step_1"), 1, text));
    }

    let title = decoded
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| SAVED_DEFAULT_TITLE.to_string());

    Sequence::new(format!("saved_{saved_id}"), title, steps)
}
