//! Backend collaborator abstraction
//!
//! The conversation store talks to the agent service, session storage and
//! sequence storage only through these traits, so tests can swap in mocks.

mod error;
mod http;
mod types;

#[cfg(test)]
pub mod testing;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::{parse_timestamp, SavedSequence, SessionId, SessionInfo, StoredMessage, UserId};

use crate::sequence::{Message, Role};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// The upstream conversational agent
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Check the service is reachable
    async fn check_health(&self) -> Result<(), BackendError>;

    /// Ask the agent for a reply. `history` is the full transcript so far,
    /// ending with the user message being answered.
    async fn generate_agent_response(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<String, BackendError>;
}

/// Server-side chat sessions and their transcripts
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, user_id: UserId, title: &str) -> Result<SessionInfo, BackendError>;

    /// Sessions for a user, most recent first
    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionInfo>, BackendError>;

    async fn append_session_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError>;

    /// Transcript in server order
    async fn fetch_session_messages(&self, session_id: SessionId) -> Result<Vec<StoredMessage>, BackendError>;
}

/// Saved sequences in canonical text form
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn persist_sequence(&self, user_id: UserId, sequence_text: &str) -> Result<(), BackendError>;

    async fn list_saved_sequences(&self, user_id: UserId) -> Result<Vec<SavedSequence>, BackendError>;
}

/// Everything the conversation store needs
pub trait Backend: AgentClient + SessionStore + SequenceStore {}
impl<T: AgentClient + SessionStore + SequenceStore> Backend for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AgentClient + ?Sized> AgentClient for Arc<T> {
    async fn check_health(&self) -> Result<(), BackendError> {
        (**self).check_health().await
    }

    async fn generate_agent_response(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<String, BackendError> {
        (**self).generate_agent_response(user_text, history).await
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn create_session(&self, user_id: UserId, title: &str) -> Result<SessionInfo, BackendError> {
        (**self).create_session(user_id, title).await
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionInfo>, BackendError> {
        (**self).list_sessions(user_id).await
    }

    async fn append_session_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError> {
        (**self).append_session_message(session_id, role, content).await
    }

    async fn fetch_session_messages(&self, session_id: SessionId) -> Result<Vec<StoredMessage>, BackendError> {
        (**self).fetch_session_messages(session_id).await
    }
}

#[async_trait]
impl<T: SequenceStore + ?Sized> SequenceStore for Arc<T> {
    async fn persist_sequence(&self, user_id: UserId, sequence_text: &str) -> Result<(), BackendError> {
        (**self).persist_sequence(user_id, sequence_text).await
    }

    async fn list_saved_sequences(&self, user_id: UserId) -> Result<Vec<SavedSequence>, BackendError> {
        (**self).list_saved_sequences(user_id).await
    }
}

// ============================================================================
// Logging wrapper
// ============================================================================

/// Logs duration and outcome of every backend call
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(operation: &'static str, started: Instant, result: &Result<T, BackendError>) {
    let duration_ms = started.elapsed().as_millis();
    match result {
        Ok(_) => tracing::debug!(operation, duration_ms, "Backend call completed"),
        Err(e) => tracing::warn!(
            operation,
            duration_ms,
            error = %e.message,
            retryable = e.kind.is_retryable(),
            "Backend call failed"
        ),
    }
}

#[async_trait]
impl<B: AgentClient> AgentClient for LoggingBackend<B> {
    async fn check_health(&self) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.check_health().await;
        log_outcome("check_health", started, &result);
        result
    }

    async fn generate_agent_response(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<String, BackendError> {
        let started = Instant::now();
        let result = self.inner.generate_agent_response(user_text, history).await;
        if let Ok(reply) = &result {
            tracing::info!(
                duration_ms = %started.elapsed().as_millis(),
                history_len = history.len(),
                reply_chars = reply.chars().count(),
                "Agent reply received"
            );
        }
        log_outcome("generate_agent_response", started, &result);
        result
    }
}

#[async_trait]
impl<B: SessionStore> SessionStore for LoggingBackend<B> {
    async fn create_session(&self, user_id: UserId, title: &str) -> Result<SessionInfo, BackendError> {
        let started = Instant::now();
        let result = self.inner.create_session(user_id, title).await;
        log_outcome("create_session", started, &result);
        result
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionInfo>, BackendError> {
        let started = Instant::now();
        let result = self.inner.list_sessions(user_id).await;
        log_outcome("list_sessions", started, &result);
        result
    }

    async fn append_session_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.append_session_message(session_id, role, content).await;
        log_outcome("append_session_message", started, &result);
        result
    }

    async fn fetch_session_messages(&self, session_id: SessionId) -> Result<Vec<StoredMessage>, BackendError> {
        let started = Instant::now();
        let result = self.inner.fetch_session_messages(session_id).await;
        log_outcome("fetch_session_messages", started, &result);
        result
    }
}

#[async_trait]
impl<B: SequenceStore> SequenceStore for LoggingBackend<B> {
    async fn persist_sequence(&self, user_id: UserId, sequence_text: &str) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.inner.persist_sequence(user_id, sequence_text).await;
        log_outcome("persist_sequence", started, &result);
        result
    }

    async fn list_saved_sequences(&self, user_id: UserId) -> Result<Vec<SavedSequence>, BackendError> {
        let started = Instant::now();
        let result = self.inner.list_saved_sequences(user_id).await;
        log_outcome("list_saved_sequences", started, &result);
        result
    }
}
