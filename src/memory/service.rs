//! Session service: lifecycle operations over the repository.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Result, SwitchboardError};
use crate::llm::Message;

use super::{
    new_session_id, Memory, Session, SessionMemory, SessionMessage, SessionRepository,
    SessionWithMessages,
};

/// High-level session operations used by the orchestrator.
pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
}

impl SessionService {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// Create a session seeded with a system message.
    ///
    /// The seed is stored both on the session row and as the first message
    /// of the log.
    pub async fn create_session(
        &self,
        user_id: &str,
        title: &str,
        system_message: &Message,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: new_session_id(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            system_message: system_message.content.clone(),
            created_at: now,
            updated_at: now,
            is_active: true,
        };

        self.repository.create_session(&session).await?;

        let seed = SessionMessage::from_message(&session.id, system_message)?;
        self.repository.add_message(&seed).await?;

        info!(session_id = %session.id, user_id = user_id, "Session created");
        Ok(session)
    }

    /// Get a `Memory` handle for a session; inactive sessions are rejected.
    pub async fn session_memory(&self, session_id: &str) -> Result<Arc<dyn Memory>> {
        let session = self.repository.get_session(session_id).await?;
        if !session.is_active {
            warn!(session_id = session_id, "Attempt to use inactive session");
            return Err(SwitchboardError::SessionInactive(session_id.to_string()));
        }
        Ok(Arc::new(SessionMemory::new(
            session_id,
            Arc::clone(&self.repository),
        )))
    }

    /// List a user's active sessions.
    pub async fn list_user_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>> {
        self.repository.list_user_sessions(user_id, limit, offset).await
    }

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.repository.get_session(session_id).await
    }

    /// Get a session together with its message log.
    pub async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages> {
        self.repository.get_session_with_messages(session_id).await
    }

    /// Rename a session.
    pub async fn update_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        let mut session = self.repository.get_session(session_id).await?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        self.repository.update_session(&session).await
    }

    /// Soft-delete a session.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.repository.delete_session(session_id).await
    }

    /// Delete all non-system messages of a session.
    pub async fn clear_session_messages(&self, session_id: &str) -> Result<()> {
        self.repository.clear_messages(session_id).await
    }
}
