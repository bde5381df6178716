//! Helix outreach assistant core
//!
//! Turns free-form agent replies into editable outreach sequences and keeps
//! the conversation, the active sequence and session identity in one store.

pub mod backend;
pub mod config;
pub mod interpreter;
pub mod sequence;
pub mod store;

pub use backend::{Backend, BackendError, BackendErrorKind, HttpBackend, LoggingBackend};
pub use config::HelixConfig;
pub use interpreter::{interpret, ParseOutcome, ResponseInterpreter};
pub use sequence::{Message, Role, Sequence, SequenceStep, StepContent};
pub use store::{ConversationStore, StoreError, StoreState};
