//! Conversation turn records.
//!
//! A [`TurnRecord`] is the client-side copy of one message in a
//! conversation. The backend owns the authoritative history; the client
//! caches records only for display, so they are immutable once created.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::WireMessage;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One message in a conversation, as cached by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TurnRecord {
    /// Create a record stamped with the current time.
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Convert a backend wire message into a local record.
    ///
    /// Backend timestamps are usually RFC 3339, but some deployments emit
    /// naive ISO-8601 (no offset); those are read as UTC. A missing or
    /// unparseable timestamp falls back to the current time rather than
    /// dropping the message.
    pub fn from_wire(msg: &WireMessage) -> Self {
        let timestamp = msg
            .timestamp
            .as_deref()
            .and_then(parse_backend_timestamp)
            .unwrap_or_else(Utc::now);
        Self {
            role: msg.role,
            content: msg.content.clone(),
            timestamp,
        }
    }
}

fn parse_backend_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serde_values() {
        assert_eq!(serde_json::to_string(&TurnRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&TurnRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(
            serde_json::to_string(&TurnRole::System).unwrap(),
            "\"system\""
        );
    }

    #[test]
    fn from_wire_rfc3339_timestamp() {
        let msg = WireMessage {
            role: TurnRole::Assistant,
            content: "hello".into(),
            timestamp: Some("2025-06-01T10:30:00+00:00".into()),
        };
        let record = TurnRecord::from_wire(&msg);
        assert_eq!(record.role, TurnRole::Assistant);
        assert_eq!(record.content, "hello");
        assert_eq!(record.timestamp.to_rfc3339(), "2025-06-01T10:30:00+00:00");
    }

    #[test]
    fn from_wire_naive_timestamp_read_as_utc() {
        let msg = WireMessage {
            role: TurnRole::User,
            content: "hi".into(),
            timestamp: Some("2025-06-01T10:30:00.123456".into()),
        };
        let record = TurnRecord::from_wire(&msg);
        assert_eq!(
            record.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2025-06-01T10:30:00"
        );
    }

    #[test]
    fn from_wire_missing_timestamp_uses_now() {
        let before = Utc::now();
        let msg = WireMessage {
            role: TurnRole::System,
            content: "fallback".into(),
            timestamp: None,
        };
        let record = TurnRecord::from_wire(&msg);
        assert!(record.timestamp >= before);
    }

    #[test]
    fn from_wire_garbage_timestamp_uses_now() {
        let before = Utc::now();
        let msg = WireMessage {
            role: TurnRole::User,
            content: "x".into(),
            timestamp: Some("not a timestamp".into()),
        };
        let record = TurnRecord::from_wire(&msg);
        assert!(record.timestamp >= before);
    }
}
