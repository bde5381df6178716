//! Conversation state published by the store

use crate::backend::{SessionId, UserId};
use crate::sequence::{Message, Sequence};

pub const GREETING: &str =
    "Hi! I'm Helix, your recruiting assistant. How can I help you create an outreach sequence today?";
pub const LOCAL_MODE_NOTE: &str = " (Note: Running in local mode - backend not connected)";
pub const CONNECTION_ERROR: &str = "Failed to connect to the backend. Make sure the backend server is running.";
pub const AGENT_APOLOGY: &str = "I'm sorry, I ran into a problem generating a response. Please try again.";
pub const SAVE_CONFIRMATION: &str = "Your sequence has been saved successfully!";
pub const SAVE_APOLOGY: &str = "I'm sorry, I couldn't save your sequence. Please try again.";
pub const DEFAULT_SESSION_TITLE: &str = "New Session";

/// User identity used when the backend is unreachable
pub const LOCAL_USER_ID: UserId = 999;

/// What the store is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    AgentRequest,
    SessionLoad,
}

/// The in-flight operation. Only the holder of the current ticket may
/// apply its result or clear the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub ticket: u64,
}

/// Read-only view of everything the store owns
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub messages: Vec<Message>,
    pub sequence: Option<Sequence>,
    pub user_id: Option<UserId>,
    pub active_session: Option<SessionId>,
    pub activity: Option<Activity>,
    pub initialized: bool,
    pub local_mode: bool,
    pub error: Option<String>,
    epoch: u64,
}

impl StoreState {
    pub fn is_processing(&self) -> bool {
        self.activity.is_some()
    }

    pub fn step_count(&self) -> usize {
        self.sequence.as_ref().map_or(0, |s| s.steps.len())
    }

    pub(super) fn with_user(user_id: Option<UserId>) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Start a new operation, superseding any in flight. Returns its ticket.
    pub(super) fn begin(&mut self, kind: ActivityKind) -> u64 {
        self.epoch += 1;
        self.activity = Some(Activity {
            kind,
            ticket: self.epoch,
        });
        self.epoch
    }

    pub(super) fn is_current(&self, ticket: u64) -> bool {
        self.activity.is_some_and(|a| a.ticket == ticket)
    }

    /// Clear the flag if `ticket` still owns it
    pub(super) fn finish(&mut self, ticket: u64) -> bool {
        if self.is_current(ticket) {
            self.activity = None;
            true
        } else {
            false
        }
    }

    pub(super) fn install_greeting(&mut self, text: impl Into<String>) {
        self.messages = vec![Message::assistant(text)];
    }
}
