//! Outreach sequence and chat transcript types

pub mod codec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sequence id of a locally synthesized, never-saved sequence
pub const LOCAL_SEQUENCE_ID: &str = "local";

/// Title used when a recovered sequence carries none
pub const DEFAULT_TITLE: &str = "Sales Outreach Sequence";

/// Separator token between a step body and its strategy note
pub const STRATEGY_MARKER: &str = "Strategy:";

/// Who authored a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// One entry of a session transcript. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped now with a fresh unique id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One numbered unit of a sequence.
///
/// `content` may hold a body followed by a `Strategy:` note; see [`StepContent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStep {
    pub id: String,
    pub step_number: u32,
    pub content: String,
    pub editable: bool,
}

impl SequenceStep {
    pub fn new(id: impl Into<String>, step_number: u32, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_number,
            content: content.into(),
            editable: true,
        }
    }

    /// Body/strategy view of the step content
    pub fn parts(&self) -> StepContent<'_> {
        StepContent::parse(&self.content)
    }
}

/// The editable outreach plan shown in the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub id: String,
    pub title: String,
    pub steps: Vec<SequenceStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sequence {
    pub fn new(id: impl Into<String>, title: impl Into<String>, steps: Vec<SequenceStep>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            steps,
            created_at: now,
            updated_at: now,
        }
    }

    /// A sequence synthesized from agent text, not yet saved anywhere
    pub fn local(title: impl Into<String>, steps: Vec<SequenceStep>) -> Self {
        Self::new(LOCAL_SEQUENCE_ID, title, steps)
    }

    pub fn is_local(&self) -> bool {
        self.id == LOCAL_SEQUENCE_ID
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replace one step's content. Returns false (and leaves `updated_at` alone)
    /// when no step has the given id.
    pub fn edit_step(&mut self, step_id: &str, content: impl Into<String>) -> bool {
        let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) else {
            return false;
        };
        step.content = content.into();
        self.touch();
        true
    }

    /// Append a placeholder step numbered `len + 1` and return it
    pub fn append_step(&mut self) -> &SequenceStep {
        let step_number = u32::try_from(self.steps.len()).unwrap_or(u32::MAX - 1) + 1;
        let step = SequenceStep::new(
            format!("step_{}", uuid::Uuid::new_v4().simple()),
            step_number,
            format!("Content for step {step_number}"),
        );
        self.steps.push(step);
        self.touch();
        &self.steps[self.steps.len() - 1]
    }
}

/// Structured view over a step's denormalized content blob.
///
/// Splits on the first `Strategy:` token. Body text that itself contains the
/// token is split there too; there is no escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContent<'a> {
    pub body: &'a str,
    pub strategy: Option<&'a str>,
}

impl<'a> StepContent<'a> {
    pub fn parse(content: &'a str) -> Self {
        match content.split_once(STRATEGY_MARKER) {
            Some((body, strategy)) => {
                let strategy = strategy.trim();
                Self {
                    body: body.trim(),
                    strategy: (!strategy.is_empty()).then_some(strategy),
                }
            }
            None => Self {
                body: content.trim(),
                strategy: None,
            },
        }
    }

    /// Join a body and an optional strategy note into one content blob
    pub fn compose(body: &str, strategy: Option<&str>) -> String {
        match strategy.map(str::trim).filter(|s| !s.is_empty()) {
            Some(strategy) => format!("{body}\n{STRATEGY_MARKER} {strategy}"),
            None => body.to_string(),
        }
    }
}
