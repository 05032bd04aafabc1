//! Repository-backed memory.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::llm::Message;

use super::{Memory, SessionMessage, SessionRepository};

/// Stateless `Memory` handle over a persisted session.
///
/// Every operation goes straight to the repository; the handle holds no
/// message state of its own, so concurrent handles on the same session see
/// the same log.
pub struct SessionMemory {
    session_id: String,
    repository: Arc<dyn SessionRepository>,
}

impl SessionMemory {
    /// Create memory bound to a session id.
    pub fn new(session_id: &str, repository: Arc<dyn SessionRepository>) -> Self {
        debug!(session_id = session_id, "Creating session memory");
        Self {
            session_id: session_id.to_string(),
            repository,
        }
    }

    /// The bound session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl Memory for SessionMemory {
    async fn messages(&self) -> Result<Vec<Message>> {
        let rows = self.repository.get_messages(&self.session_id).await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            match row.to_message() {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    warn!(
                        session_id = %self.session_id,
                        message_id = row.id,
                        error = %e,
                        "Skipping unreadable session message"
                    );
                }
            }
        }
        Ok(messages)
    }

    async fn add(&self, message: Message) -> Result<()> {
        let row = SessionMessage::from_message(&self.session_id, &message)?;
        self.repository.add_message(&row).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.repository.clear_messages(&self.session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::memory::{new_session_id, Session, SqliteSessionRepository};
    use chrono::Utc;

    async fn memory_with_seed() -> (SessionMemory, Arc<dyn SessionRepository>) {
        let repo: Arc<dyn SessionRepository> =
            Arc::new(SqliteSessionRepository::new("sqlite::memory:").await.unwrap());

        let now = Utc::now();
        let session = Session {
            id: new_session_id(),
            user_id: "u1".into(),
            title: "Chat".into(),
            system_message: "seed".into(),
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        repo.create_session(&session).await.unwrap();

        let memory = SessionMemory::new(&session.id, Arc::clone(&repo));
        memory.add(Message::system("seed")).await.unwrap();
        (memory, repo)
    }

    #[tokio::test]
    async fn test_add_and_read_back() {
        let (memory, _repo) = memory_with_seed().await;
        memory.add(Message::user("hi")).await.unwrap();
        memory.add(Message::assistant("hello")).await.unwrap();

        let messages = memory.messages().await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].content, "hello");
    }

    #[tokio::test]
    async fn test_clear_keeps_system_row() {
        let (memory, _repo) = memory_with_seed().await;
        memory.add(Message::user("hi")).await.unwrap();
        memory.clear().await.unwrap();

        let messages = memory.messages().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_two_handles_share_state() {
        let (memory, repo) = memory_with_seed().await;
        let second = SessionMemory::new(memory.session_id(), repo);

        memory.add(Message::user("from first")).await.unwrap();
        let seen = second.messages().await.unwrap();
        assert!(seen.iter().any(|m| m.content == "from first"));
    }

    #[tokio::test]
    async fn test_tool_call_round_trip_through_store() {
        let (memory, _repo) = memory_with_seed().await;
        let msg = Message::assistant_with_tools(
            "",
            vec![crate::llm::ToolCall::new("call_1", "lookup", "{}")],
        );
        memory.add(msg.clone()).await.unwrap();

        let messages = memory.messages().await.unwrap();
        assert_eq!(messages.last().unwrap(), &msg);
    }
}
