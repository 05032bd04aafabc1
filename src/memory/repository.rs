//! Session persistence contract.

use async_trait::async_trait;

use crate::error::Result;

use super::{Session, SessionMessage, SessionWithMessages};

/// Manages session persistence.
///
/// Concurrency is the store's responsibility: concurrent `add_message`
/// calls to the same session interleave in the order of the store's
/// assigned timestamps and ids.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session row.
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Fetch a session by id.
    async fn get_session(&self, session_id: &str) -> Result<Session>;

    /// Fetch a session together with its ordered message log.
    async fn get_session_with_messages(&self, session_id: &str) -> Result<SessionWithMessages>;

    /// List a user's active sessions, most recently updated first.
    async fn list_user_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>>;

    /// Update session metadata (title, activity, updated_at).
    async fn update_session(&self, session: &Session) -> Result<()>;

    /// Soft-delete a session (`is_active = false`).
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Persist a message and bump the session's `updated_at`. Returns the
    /// store-assigned message id.
    async fn add_message(&self, message: &SessionMessage) -> Result<i64>;

    /// All messages for a session, ordered ascending by creation.
    async fn get_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>>;

    /// Delete all non-system messages for a session.
    async fn clear_messages(&self, session_id: &str) -> Result<()>;

    /// Number of messages in a session.
    async fn message_count(&self, session_id: &str) -> Result<i64>;
}
