//! Records exchanged with the backend service

use crate::sequence::{Message, Role};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type SessionId = i64;

/// A server-owned conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionInfo {
    pub fn updated_at(&self) -> DateTime<Utc> {
        parse_timestamp(&self.updated_at)
    }
}

/// A saved sequence in canonical text form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSequence {
    pub id: i64,
    pub text: String,
}

impl SavedSequence {
    /// First `max_chars` characters, for list previews
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// A transcript message as the server stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl StoredMessage {
    /// Convert to a transcript message, keeping the server id and timestamp.
    ///
    /// Returns `None` for roles the transcript does not show.
    pub fn into_message(self) -> Option<Message> {
        let role: Role = match self.role.parse() {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(message_id = self.id, error = %e, "Skipping stored message");
                return None;
            }
        };
        Some(Message {
            id: self.id.to_string(),
            role,
            content: self.content,
            timestamp: parse_timestamp(&self.created_at),
        })
    }
}

/// Parse a server timestamp. Accepts RFC 3339 and naive ISO 8601 (taken as
/// UTC); anything else maps to now.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc()))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), expected);
        assert_eq!(parse_timestamp("2024-03-01T12:30:00"), expected);
        assert_eq!(
            parse_timestamp("2024-03-01T12:30:00.250000").timestamp_millis(),
            expected.timestamp_millis() + 250
        );
    }

    #[test]
    fn test_parse_timestamp_garbage_is_now() {
        let before = Utc::now();
        assert!(parse_timestamp("yesterday-ish") >= before);
    }

    #[test]
    fn test_stored_message_conversion() {
        let stored = StoredMessage {
            id: 12,
            role: "assistant".to_string(),
            content: "Hello".to_string(),
            created_at: "2024-03-01T12:30:00".to_string(),
        };
        let msg = stored.into_message().unwrap();
        assert_eq!(msg.id, "12");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_stored_message_unknown_role() {
        let stored = StoredMessage {
            id: 1,
            role: "system".to_string(),
            content: "x".to_string(),
            created_at: String::new(),
        };
        assert!(stored.into_message().is_none());
    }

    #[test]
    fn test_saved_preview() {
        let saved = SavedSequence {
            id: 1,
            text: "Step 1: Hello there".to_string(),
        };
        assert_eq!(saved.preview(6), "Step 1...");
        assert_eq!(saved.preview(100), "Step 1: Hello there");
    }
}
