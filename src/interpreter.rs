//! Recovers a structured outreach sequence from free-form agent text
//!
//! Extraction runs through a fixed list of [`Stage`]s, highest confidence
//! first. The first stage that produces steps wins; a failing stage never
//! surfaces an error, it just hands over to the next one. The last stage
//! cannot fail, so [`ResponseInterpreter::interpret`] is total.

mod json;
mod prose;

#[cfg(test)]
mod proptests;

use crate::sequence::{Sequence, SequenceStep, DEFAULT_TITLE};

/// Result of interpreting one agent reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A sequence was recovered; `display_message` is a short confirmation
    Structured {
        sequence: Sequence,
        display_message: String,
    },
    /// Nothing to recover; the raw text passes through for display
    Unstructured { display_message: String },
}

impl ParseOutcome {
    pub fn display_message(&self) -> &str {
        match self {
            ParseOutcome::Structured {
                display_message, ..
            }
            | ParseOutcome::Unstructured { display_message } => display_message,
        }
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            ParseOutcome::Structured { sequence, .. } => Some(sequence),
            ParseOutcome::Unstructured { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ParseOutcome::Structured { .. })
    }
}

/// Extraction strategies in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// JSON object inside a code fence or between braces in surrounding prose
    EmbeddedJson,
    /// The whole reply is JSON (possibly a JSON string holding the object)
    WholeJson,
    /// `1. ... 2. ...` items, at least two
    NumberedList,
    /// At least two significant blank-line separated paragraphs
    Paragraphs,
    /// At least one significant sentence
    Sentences,
    /// The entire reply as one step
    SingleBlob,
}

impl Stage {
    /// Attempt order. The first stage to produce steps wins.
    pub const ORDER: [Stage; 6] = [
        Stage::EmbeddedJson,
        Stage::WholeJson,
        Stage::NumberedList,
        Stage::Paragraphs,
        Stage::Sentences,
        Stage::SingleBlob,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::EmbeddedJson => "embedded_json",
            Stage::WholeJson => "whole_json",
            Stage::NumberedList => "numbered_list",
            Stage::Paragraphs => "paragraphs",
            Stage::Sentences => "sentences",
            Stage::SingleBlob => "single_blob",
        }
    }

    fn is_json(self) -> bool {
        matches!(self, Stage::EmbeddedJson | Stage::WholeJson)
    }
}

/// Tuning knobs for the prose stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// A paragraph or sentence counts only if its trimmed length exceeds this
    pub min_significant_chars: usize,
    /// Cap on steps taken from paragraphs or sentences
    pub max_prose_steps: usize,
    pub default_title: String,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            min_significant_chars: 30,
            max_prose_steps: 3,
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// A step before ids and numbering are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DraftStep {
    pub content: String,
    /// Explicit number from the source, overriding the position
    pub step_number: Option<u32>,
}

impl DraftStep {
    pub(crate) fn positional(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            step_number: None,
        }
    }
}

/// Steps and title recovered by one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub stage: Stage,
    pub title: String,
    pub steps: Vec<SequenceStep>,
}

/// Stateless agent-reply interpreter
#[derive(Debug, Clone, Default)]
pub struct ResponseInterpreter {
    options: InterpreterOptions,
}

impl ResponseInterpreter {
    pub fn new(options: InterpreterOptions) -> Self {
        Self { options }
    }

    /// Interpret one raw reply. Never fails.
    ///
    /// Blank input is the only thing that comes back `Unstructured`.
    pub fn interpret(&self, raw: &str) -> ParseOutcome {
        let Some(recovered) = self.recover(raw) else {
            return ParseOutcome::Unstructured {
                display_message: raw.to_string(),
            };
        };

        let display_message = confirmation_message(&recovered.title, recovered.steps.len());
        ParseOutcome::Structured {
            sequence: Sequence::local(recovered.title, recovered.steps),
            display_message,
        }
    }

    /// Run the stages in [`Stage::ORDER`] and return the first success.
    ///
    /// Returns `None` only for blank input.
    pub fn recover(&self, raw: &str) -> Option<Recovered> {
        if raw.trim().is_empty() {
            return None;
        }

        for stage in Stage::ORDER {
            let attempt = match stage {
                Stage::EmbeddedJson => json::embedded(raw),
                Stage::WholeJson => json::whole(raw),
                Stage::NumberedList => prose::numbered_list(raw).map(|steps| (None, steps)),
                Stage::Paragraphs => Some(prose::paragraphs(raw, &self.options))
                    .filter(|paragraphs| paragraphs.len() >= 2)
                    .map(|steps| (None, steps)),
                Stage::Sentences => Some(prose::sentences(raw, &self.options))
                    .filter(|sentences| !sentences.is_empty())
                    .map(|steps| (None, steps)),
                Stage::SingleBlob => Some((None, vec![DraftStep::positional(raw)])),
            };

            match attempt {
                Some((json_title, drafts)) => {
                    let title = if stage.is_json() {
                        json_title.unwrap_or_else(|| self.options.default_title.clone())
                    } else {
                        json::stepless_title(raw)
                            .or_else(|| prose::subject_title(raw))
                            .unwrap_or_else(|| self.options.default_title.clone())
                    };
                    tracing::debug!(stage = stage.as_str(), steps = drafts.len(), "Recovered sequence");
                    return Some(Recovered {
                        stage,
                        title,
                        steps: number_steps(drafts),
                    });
                }
                None => {
                    tracing::debug!(stage = stage.as_str(), "Extraction stage found nothing");
                }
            }
        }

        None
    }
}

/// Interpret with default options
pub fn interpret(raw: &str) -> ParseOutcome {
    ResponseInterpreter::default().interpret(raw)
}

/// Fixed-template confirmation shown in the transcript instead of the payload
pub fn confirmation_message(title: &str, step_count: usize) -> String {
    let noun = if step_count == 1 { "step" } else { "steps" };
    format!(
        "I've created a \"{title}\" sequence with {step_count} {noun}. You can view and edit it in the workspace panel."
    )
}

fn number_steps(drafts: Vec<DraftStep>) -> Vec<SequenceStep> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
            SequenceStep::new(
                format!("step_{position}"),
                draft.step_number.unwrap_or(position),
                draft.content,
            )
        })
        .collect()
}
