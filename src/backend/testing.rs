//! Mock backend for store tests
//!
//! Queues canned replies, records every call, and can hold an agent request
//! or a history fetch in flight so tests can interleave other operations.

use super::{
    AgentClient, BackendError, SavedSequence, SequenceStore, SessionId, SessionInfo, SessionStore, StoredMessage,
    UserId,
};
use crate::sequence::{Message, Role};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CheckHealth,
    Generate { user_text: String, history: Vec<(Role, String)> },
    CreateSession { user_id: UserId, title: String },
    ListSessions(UserId),
    AppendMessage { session_id: SessionId, role: Role, content: String },
    FetchMessages(SessionId),
    Persist { user_id: UserId, text: String },
    ListSaved(UserId),
}

/// Holds a call until released. Signals when the call has started waiting.
#[derive(Default)]
pub struct Gate {
    started: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until the gated call is in flight
    pub async fn started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

pub struct MockBackend {
    health: Mutex<Result<(), BackendError>>,
    agent_replies: Mutex<VecDeque<Result<String, BackendError>>>,
    sessions: Mutex<Vec<SessionInfo>>,
    histories: Mutex<HashMap<SessionId, Result<Vec<StoredMessage>, BackendError>>>,
    append_error: Mutex<Option<BackendError>>,
    saved: Mutex<Result<Vec<SavedSequence>, BackendError>>,
    persist_results: Mutex<VecDeque<Result<(), BackendError>>>,
    agent_gate: Mutex<Option<Arc<Gate>>>,
    history_gate: Mutex<Option<Arc<Gate>>>,
    next_session_id: AtomicI64,
    /// Record of all calls made
    pub calls: Mutex<Vec<BackendCall>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            health: Mutex::new(Ok(())),
            agent_replies: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(Vec::new()),
            histories: Mutex::new(HashMap::new()),
            append_error: Mutex::new(None),
            saved: Mutex::new(Ok(Vec::new())),
            persist_results: Mutex::new(VecDeque::new()),
            agent_gate: Mutex::new(None),
            history_gate: Mutex::new(None),
            next_session_id: AtomicI64::new(100),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_health(&self, result: Result<(), BackendError>) {
        *self.health.lock().unwrap() = result;
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.agent_replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_agent_error(&self, error: BackendError) {
        self.agent_replies.lock().unwrap().push_back(Err(error));
    }

    /// Add a session with a stored transcript
    pub fn add_session(&self, id: SessionId, title: &str, messages: Vec<StoredMessage>) {
        self.sessions.lock().unwrap().push(SessionInfo {
            id,
            title: title.to_string(),
            created_at: "2024-03-01T12:00:00".to_string(),
            updated_at: "2024-03-01T12:00:00".to_string(),
        });
        self.histories.lock().unwrap().insert(id, Ok(messages));
    }

    pub fn fail_history(&self, id: SessionId, error: BackendError) {
        self.histories.lock().unwrap().insert(id, Err(error));
    }

    pub fn fail_appends(&self, error: BackendError) {
        *self.append_error.lock().unwrap() = Some(error);
    }

    pub fn set_saved(&self, result: Result<Vec<SavedSequence>, BackendError>) {
        *self.saved.lock().unwrap() = result;
    }

    pub fn queue_persist_result(&self, result: Result<(), BackendError>) {
        self.persist_results.lock().unwrap().push_back(result);
    }

    /// Hold the next agent request until the returned gate is released
    pub fn hold_agent(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.agent_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Hold the next history fetch until the returned gate is released
    pub fn hold_history(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.history_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn recorded_calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn appended_messages(&self) -> Vec<(SessionId, Role, String)> {
        self.recorded_calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::AppendMessage {
                    session_id,
                    role,
                    content,
                } => Some((session_id, role, content)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn stored(id: i64, role: &str, content: &str, created_at: &str) -> StoredMessage {
    StoredMessage {
        id,
        role: role.to_string(),
        content: content.to_string(),
        created_at: created_at.to_string(),
    }
}

#[async_trait]
impl AgentClient for MockBackend {
    async fn check_health(&self) -> Result<(), BackendError> {
        self.record(BackendCall::CheckHealth);
        self.health.lock().unwrap().clone()
    }

    async fn generate_agent_response(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<String, BackendError> {
        self.record(BackendCall::Generate {
            user_text: user_text.to_string(),
            history: history.iter().map(|m| (m.role, m.content.clone())).collect(),
        });
        let gate = self.agent_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.agent_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock reply queued")))
    }
}

#[async_trait]
impl SessionStore for MockBackend {
    async fn create_session(&self, user_id: UserId, title: &str) -> Result<SessionInfo, BackendError> {
        self.record(BackendCall::CreateSession {
            user_id,
            title: title.to_string(),
        });
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let info = SessionInfo {
            id,
            title: title.to_string(),
            created_at: "2024-03-05T09:00:00".to_string(),
            updated_at: "2024-03-05T09:00:00".to_string(),
        };
        self.sessions.lock().unwrap().insert(0, info.clone());
        self.histories.lock().unwrap().insert(id, Ok(Vec::new()));
        Ok(info)
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionInfo>, BackendError> {
        self.record(BackendCall::ListSessions(user_id));
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn append_session_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::AppendMessage {
            session_id,
            role,
            content: content.to_string(),
        });
        match self.append_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_session_messages(&self, session_id: SessionId) -> Result<Vec<StoredMessage>, BackendError> {
        self.record(BackendCall::FetchMessages(session_id));
        let gate = self.history_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.histories
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::not_found(format!("Session {session_id} not found"))))
    }
}

#[async_trait]
impl SequenceStore for MockBackend {
    async fn persist_sequence(&self, user_id: UserId, sequence_text: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Persist {
            user_id,
            text: sequence_text.to_string(),
        });
        self.persist_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn list_saved_sequences(&self, user_id: UserId) -> Result<Vec<SavedSequence>, BackendError> {
        self.record(BackendCall::ListSaved(user_id));
        self.saved.lock().unwrap().clone()
    }
}
