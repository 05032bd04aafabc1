//! Session and session-message types.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::{Message, Role, ToolCall};

/// A persistent conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Sortable id: `YYYYMMDDhhmmss-` plus 8 random alphanumerics.
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// The seeded system-message text.
    pub system_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete flag; inactive sessions reject new messages.
    pub is_active: bool,
}

/// A single persisted message within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Store-assigned id (0 until persisted).
    pub id: i64,
    pub session_id: String,
    pub role: String,
    pub content: String,
    /// JSON-serialized tool-call array; empty when none.
    #[serde(default)]
    pub tool_calls: String,
    #[serde(default)]
    pub tool_call_id: String,
    pub created_at: DateTime<Utc>,
}

/// A session together with its full message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithMessages {
    pub session: Session,
    pub messages: Vec<SessionMessage>,
}

/// Generate a new session id: a UTC timestamp prefix (`YYYYMMDDhhmmss`)
/// followed by `-` and 8 random alphanumerics. The prefix makes ids
/// lexicographically monotonic at second granularity.
pub fn new_session_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

impl SessionMessage {
    /// Convert a conversation message into its persisted form.
    pub fn from_message(session_id: &str, message: &Message) -> Result<Self> {
        let tool_calls = match &message.tool_calls {
            Some(calls) if !calls.is_empty() => serde_json::to_string(calls)?,
            _ => String::new(),
        };

        Ok(Self {
            id: 0,
            session_id: session_id.to_string(),
            role: message.role.to_string(),
            content: message.content.clone(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone().unwrap_or_default(),
            created_at: Utc::now(),
        })
    }

    /// Convert the persisted form back into a conversation message.
    pub fn to_message(&self) -> Result<Message> {
        let role: Role = self.role.parse()?;
        let tool_calls = if self.tool_calls.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Vec<ToolCall>>(&self.tool_calls)?)
        };

        Ok(Message {
            role,
            content: self.content.clone(),
            tool_calls,
            tool_call_id: if self.tool_call_id.is_empty() {
                None
            } else {
                Some(self.tool_call_id.clone())
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        assert_eq!(id.len(), 14 + 1 + 8);
        let (prefix, suffix) = id.split_at(14);
        assert!(prefix.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&suffix[..1], "-");
        assert!(suffix[1..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_round_trip_plain_message() {
        let msg = Message::user("hello");
        let persisted = SessionMessage::from_message("sid", &msg).unwrap();
        assert_eq!(persisted.role, "user");
        assert!(persisted.tool_calls.is_empty());
        assert_eq!(persisted.to_message().unwrap(), msg);
    }

    #[test]
    fn test_round_trip_tool_calls() {
        let msg = Message::assistant_with_tools(
            "calling",
            vec![ToolCall::new("call_1", "lookup", r#"{"id":"42"}"#)],
        );
        let persisted = SessionMessage::from_message("sid", &msg).unwrap();
        assert!(persisted.tool_calls.contains("lookup"));
        let restored = persisted.to_message().unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_round_trip_tool_result() {
        let msg = Message::tool_result("call_1", "done");
        let persisted = SessionMessage::from_message("sid", &msg).unwrap();
        assert_eq!(persisted.tool_call_id, "call_1");
        assert_eq!(persisted.to_message().unwrap(), msg);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let persisted = SessionMessage {
            id: 1,
            session_id: "sid".into(),
            role: "robot".into(),
            content: String::new(),
            tool_calls: String::new(),
            tool_call_id: String::new(),
            created_at: Utc::now(),
        };
        assert!(persisted.to_message().is_err());
    }
}
