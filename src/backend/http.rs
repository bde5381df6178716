//! HTTP implementation of the backend traits against the outreach service

use super::{
    AgentClient, BackendError, SavedSequence, SequenceStore, SessionId, SessionInfo, SessionStore, StoredMessage,
    UserId,
};
use crate::config::HelixConfig;
use crate::sequence::{Message, Role};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Talks JSON over HTTP to the outreach service
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    message: &'a str,
    history: Vec<HistoryEntry<'a>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct SaveSequenceRequest<'a> {
    user_id: UserId,
    sequence_text: &'a str,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    user_id: UserId,
    title: &'a str,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    session_id: SessionId,
    role: Role,
    content: &'a str,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &HelixConfig) -> Result<Self, BackendError> {
        Self::new(&config.api_url, config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify_error(status: StatusCode, body: &str) -> BackendError {
        // The service reports failures as {"error": "..."}
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.to_string());

        match status.as_u16() {
            400 => BackendError::invalid_request(format!("Invalid request: {message}")),
            404 => BackendError::not_found(format!("Not found: {message}")),
            500..=599 => BackendError::server_error(format!("Server error: {message}")),
            _ => BackendError::unknown(format!("HTTP {status}: {message}")),
        }
    }

    /// Send, check status, return the raw body
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                BackendError::network(format!("Connection failed: {e}"))
            } else {
                BackendError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| BackendError::decode(format!("Failed to parse response: {e} - body: {body}")))
    }
}

#[async_trait]
impl AgentClient for HttpBackend {
    async fn check_health(&self) -> Result<(), BackendError> {
        self.send(self.client.get(self.url("/"))).await.map(|_| ())
    }

    async fn generate_agent_response(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<String, BackendError> {
        let request = GenerateRequest {
            message: user_text,
            history: history
                .iter()
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
        };
        let response: GenerateResponse = self
            .send_json(self.client.post(self.url("/generate_sequence")).json(&request))
            .await?;
        Ok(response.response)
    }
}

#[async_trait]
impl SessionStore for HttpBackend {
    async fn create_session(&self, user_id: UserId, title: &str) -> Result<SessionInfo, BackendError> {
        let request = CreateSessionRequest { user_id, title };
        self.send_json(self.client.post(self.url("/api/sessions")).json(&request))
            .await
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionInfo>, BackendError> {
        let url = self.url(&format!("/api/sessions?user_id={user_id}"));
        self.send_json(self.client.get(url)).await
    }

    async fn append_session_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError> {
        let request = ChatMessageRequest {
            session_id,
            role,
            content,
        };
        self.send(self.client.post(self.url("/api/chat/message")).json(&request))
            .await
            .map(|_| ())
    }

    async fn fetch_session_messages(&self, session_id: SessionId) -> Result<Vec<StoredMessage>, BackendError> {
        let url = self.url(&format!("/api/chat/history/{session_id}"));
        self.send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl SequenceStore for HttpBackend {
    async fn persist_sequence(&self, user_id: UserId, sequence_text: &str) -> Result<(), BackendError> {
        let request = SaveSequenceRequest { user_id, sequence_text };
        self.send(self.client.post(self.url("/save_sequence")).json(&request))
            .await
            .map(|_| ())
    }

    async fn list_saved_sequences(&self, user_id: UserId) -> Result<Vec<SavedSequence>, BackendError> {
        let url = self.url(&format!("/get_sequences/{user_id}"));
        self.send_json(self.client.get(url)).await
    }
}
