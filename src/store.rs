//! Conversation store
//!
//! Owns the transcript, the active sequence, session identity and the
//! processing flag. Callers never touch state directly: they read
//! snapshots (or subscribe to changes) and mutate through the operations
//! below.
//!
//! The agent-request and session-load flows each hold a ticket while in
//! flight. A session switch starts a new ticket, so a reply that arrives
//! for a superseded request is dropped instead of landing in the wrong
//! transcript.

mod state;


pub use state::{
    Activity, ActivityKind, StoreState, AGENT_APOLOGY, CONNECTION_ERROR, DEFAULT_SESSION_TITLE, GREETING,
    LOCAL_MODE_NOTE, LOCAL_USER_ID, SAVE_APOLOGY, SAVE_CONFIRMATION,
};

use crate::backend::{Backend, BackendError, SavedSequence, SessionId, SessionInfo, StoredMessage, UserId};
use crate::interpreter::{ParseOutcome, ResponseInterpreter};
use crate::sequence::{codec, Message, Role, Sequence, SequenceStep};
use thiserror::Error;
use tokio::sync::watch;

/// Why a store operation was rejected. Rejections never change state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A request is already in progress")]
    Busy,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("No active sequence")]
    NoActiveSequence,
    #[error("No user identity")]
    NoUser,
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Clears the processing flag when the owning flow ends, however it ends
struct ProcessingGuard<'a> {
    state: &'a watch::Sender<StoreState>,
    ticket: u64,
}

impl<'a> ProcessingGuard<'a> {
    fn new(state: &'a watch::Sender<StoreState>, ticket: u64) -> Self {
        Self { state, ticket }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.state.send_if_modified(|s| s.finish(ticket));
    }
}

pub struct ConversationStore<B> {
    backend: B,
    interpreter: ResponseInterpreter,
    state: watch::Sender<StoreState>,
}

impl<B: Backend> ConversationStore<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            backend,
            interpreter: ResponseInterpreter::default(),
            state,
        }
    }

    pub fn with_user(self, user_id: UserId) -> Self {
        self.state.send_replace(StoreState::with_user(Some(user_id)));
        self
    }

    pub fn with_interpreter(mut self, interpreter: ResponseInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Observe every state change
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.state.borrow().user_id
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.state.borrow().active_session
    }

    pub fn is_processing(&self) -> bool {
        self.state.borrow().is_processing()
    }

    /// Check the backend and install the opening greeting. Falls back to
    /// local mode when the backend is unreachable. Returns whether the
    /// backend answered.
    pub async fn initialize(&self) -> bool {
        match self.backend.check_health().await {
            Ok(()) => {
                tracing::info!("Backend reachable");
                self.state.send_modify(|s| {
                    s.install_greeting(GREETING);
                    s.error = None;
                    s.local_mode = false;
                    s.initialized = true;
                });
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to backend, running in local mode");
                self.state.send_modify(|s| {
                    s.install_greeting(format!("{GREETING}{LOCAL_MODE_NOTE}"));
                    s.error = Some(CONNECTION_ERROR.to_string());
                    s.user_id = Some(LOCAL_USER_ID);
                    s.local_mode = true;
                    s.initialized = true;
                });
                false
            }
        }
    }

    // ========================================================================
    // Agent requests
    // ========================================================================

    /// Append a user message and run the agent round trip for it.
    ///
    /// The user message is visible before the request goes out. The reply
    /// is interpreted and merged only if no session switch superseded the
    /// request in the meantime.
    pub async fn append_user_message(&self, text: &str) -> Result<(), StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        let mut started = None;
        self.state.send_if_modified(|s| {
            if s.is_processing() {
                return false;
            }
            s.messages.push(Message::user(text));
            let ticket = s.begin(ActivityKind::AgentRequest);
            started = Some((ticket, s.active_session, s.messages.clone()));
            true
        });
        let Some((ticket, session, history)) = started else {
            tracing::info!("Rejecting user message while a request is in flight");
            return Err(StoreError::Busy);
        };
        let _guard = ProcessingGuard::new(&self.state, ticket);

        if let Some(session_id) = session {
            self.record_in_session(session_id, Role::User, text).await;
        }

        match self.backend.generate_agent_response(text, &history).await {
            Ok(raw) => {
                let outcome = self.interpreter.interpret(&raw);
                let display = outcome.display_message().to_string();
                tracing::debug!(ticket, structured = outcome.is_structured(), "Merging agent reply");
                let applied = self.apply_if_current(ticket, |s| merge_outcome(s, outcome));
                if let (true, Some(session_id)) = (applied, session) {
                    self.record_in_session(session_id, Role::Assistant, &display).await;
                }
            }
            Err(e) => {
                tracing::error!(ticket, error = %e, "Agent request failed");
                self.apply_if_current(ticket, |s| s.messages.push(Message::assistant(AGENT_APOLOGY)));
            }
        }
        Ok(())
    }

    /// Best-effort write of a transcript message to the server session
    async fn record_in_session(&self, session_id: SessionId, role: Role, content: &str) {
        if let Err(e) = self.backend.append_session_message(session_id, role, content).await {
            tracing::warn!(session_id, %role, error = %e, "Failed to save message to session");
        }
    }

    /// Apply `f` only while `ticket` still owns the processing flag
    fn apply_if_current(&self, ticket: u64, f: impl FnOnce(&mut StoreState)) -> bool {
        let applied = self.state.send_if_modified(|s| {
            if !s.is_current(ticket) {
                return false;
            }
            f(s);
            true
        });
        if !applied {
            tracing::info!(ticket, "Discarding result of superseded operation");
        }
        applied
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Make `session_id` active and load its transcript. Supersedes any
    /// operation in flight. Returns whether the transcript was fetched;
    /// on failure the transcript is the single greeting.
    pub async fn switch_active_session(&self, session_id: SessionId) -> bool {
        let mut ticket = 0;
        let mut superseded = None;
        self.state.send_modify(|s| {
            superseded = s.activity.map(|a| a.kind);
            s.active_session = Some(session_id);
            s.messages.clear();
            ticket = s.begin(ActivityKind::SessionLoad);
        });
        if let Some(kind) = superseded {
            tracing::info!(session_id, superseded = ?kind, "Session switch supersedes in-flight operation");
        }
        let _guard = ProcessingGuard::new(&self.state, ticket);

        match self.backend.fetch_session_messages(session_id).await {
            Ok(stored) => {
                let messages: Vec<Message> = stored.into_iter().filter_map(StoredMessage::into_message).collect();
                let count = messages.len();
                if self.apply_if_current(ticket, |s| s.messages = messages) {
                    tracing::info!(session_id, count, "Loaded session transcript");
                }
                true
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Failed to load session messages");
                self.apply_if_current(ticket, |s| s.install_greeting(GREETING));
                false
            }
        }
    }

    /// Sessions for the current user, most recent first. Empty on failure.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let Some(user_id) = self.user_id() else {
            return Vec::new();
        };
        self.backend.list_sessions(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "Failed to list sessions");
            Vec::new()
        })
    }

    /// Create a session and switch to it
    pub async fn create_session(&self, title: Option<&str>) -> Result<SessionInfo, StoreError> {
        let user_id = self.user_id().ok_or(StoreError::NoUser)?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SESSION_TITLE);

        let session = self.backend.create_session(user_id, title).await?;
        tracing::info!(session_id = session.id, title = %session.title, "Created session");
        self.switch_active_session(session.id).await;
        Ok(session)
    }

    /// Switch to the most recent session when none is active yet
    pub async fn open_default_session(&self) -> Option<SessionId> {
        let active = self.active_session();
        if active.is_some() {
            return active;
        }
        let latest = self.list_sessions().await.into_iter().next()?;
        self.switch_active_session(latest.id).await;
        Some(latest.id)
    }

    // ========================================================================
    // Sequence editing
    // ========================================================================

    /// Replace one step's content. `Ok(false)` when the step id is unknown,
    /// in which case nothing changes (not even `updated_at`).
    pub fn edit_step(&self, step_id: &str, content: &str) -> Result<bool, StoreError> {
        let mut result = Err(StoreError::NoActiveSequence);
        self.state.send_if_modified(|s| {
            let Some(sequence) = s.sequence.as_mut() else {
                return false;
            };
            let edited = sequence.edit_step(step_id, content);
            result = Ok(edited);
            edited
        });
        if matches!(result, Ok(false)) {
            tracing::debug!(step_id, "Ignoring edit for unknown step");
        }
        result
    }

    /// Append a placeholder step and return a copy of it
    pub fn append_step(&self) -> Result<SequenceStep, StoreError> {
        let mut appended = None;
        self.state.send_if_modified(|s| {
            let Some(sequence) = s.sequence.as_mut() else {
                return false;
            };
            appended = Some(sequence.append_step().clone());
            true
        });
        appended.ok_or(StoreError::NoActiveSequence)
    }

    /// Unconditionally replace the active sequence
    pub fn replace_sequence(&self, mut sequence: Sequence) {
        sequence.touch();
        tracing::debug!(sequence_id = %sequence.id, steps = sequence.steps.len(), "Replacing active sequence");
        self.state.send_modify(|s| s.sequence = Some(sequence));
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the active sequence in canonical text form. Appends a
    /// confirmation or an apology to the transcript and returns whether
    /// the save went through.
    pub async fn persist_active_sequence(&self) -> Result<bool, StoreError> {
        let (user_id, text) = {
            let s = self.state.borrow();
            let sequence = s.sequence.as_ref().ok_or(StoreError::NoActiveSequence)?;
            let user_id = s.user_id.ok_or(StoreError::NoUser)?;
            (user_id, codec::encode(sequence))
        };

        let saved = match self.backend.persist_sequence(user_id, &text).await {
            Ok(()) => {
                tracing::info!(user_id, "Saved sequence");
                true
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to save sequence");
                false
            }
        };
        let reply = if saved { SAVE_CONFIRMATION } else { SAVE_APOLOGY };
        self.state.send_modify(|s| s.messages.push(Message::assistant(reply)));
        Ok(saved)
    }

    /// Saved sequences for the current user. Empty on failure.
    pub async fn saved_sequences(&self) -> Vec<SavedSequence> {
        let Some(user_id) = self.user_id() else {
            return Vec::new();
        };
        self.backend.list_saved_sequences(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "Failed to list saved sequences");
            Vec::new()
        })
    }

    /// Decode a saved sequence and make it active
    pub fn load_saved_sequence(&self, saved: &SavedSequence) {
        let sequence = codec::decode_saved(&saved.id.to_string(), &saved.text);
        tracing::info!(saved_id = saved.id, steps = sequence.steps.len(), "Loaded saved sequence");
        self.replace_sequence(sequence);
    }
}

fn merge_outcome(state: &mut StoreState, outcome: ParseOutcome) {
    match outcome {
        ParseOutcome::Structured {
            sequence,
            display_message,
        } => {
            state.sequence = Some(sequence);
            state.messages.push(Message::assistant(display_message));
        }
        ParseOutcome::Unstructured { display_message } => {
            state.messages.push(Message::assistant(display_message));
        }
    }
}
