//! SQLite-backed session repository.
//!
//! One database file holds two tables, `sessions` and `session_messages`.
//! Timestamps are stored as RFC 3339 text; deletion is soft
//! (`is_active = 0`). Pass `"sqlite::memory:"` for an ephemeral database in
//! tests.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::{Result, SwitchboardError};

use super::{Session, SessionMessage, SessionRepository, SessionWithMessages};

/// Session repository on a SQLite connection pool.
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    /// Open (creating if missing) a SQLite database and run migrations.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| SwitchboardError::Storage(format!("invalid SQLite url: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("foreign_keys", "ON");

        // A single connection keeps in-memory databases coherent (each
        // SQLite connection to `:memory:` is otherwise a separate database)
        // and serializes writes, which the session store wants anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| SwitchboardError::Storage(format!("failed to open SQLite: {}", e)))?;

        let repo = Self { pool };
        repo.run_migrations().await?;
        info!(url = url, "SQLite session repository initialized");
        Ok(repo)
    }

    /// Build from an existing pool (useful for tests).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let repo = Self { pool };
        repo.run_migrations().await?;
        Ok(repo)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                title          TEXT NOT NULL DEFAULT '',
                system_message TEXT NOT NULL DEFAULT '',
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL,
                is_active      INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("sessions table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_messages (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL REFERENCES sessions(id),
                role         TEXT NOT NULL,
                content      TEXT NOT NULL DEFAULT '',
                tool_calls   TEXT NOT NULL DEFAULT '',
                tool_call_id TEXT NOT NULL DEFAULT '',
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("session_messages table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_session_messages_session
             ON session_messages(session_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("messages index: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user
             ON sessions(user_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("sessions index: {}", e)))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_session(row: &SqliteRow) -> Result<Session> {
        Ok(Session {
            id: get(row, "id")?,
            user_id: get(row, "user_id")?,
            title: get(row, "title")?,
            system_message: get(row, "system_message")?,
            created_at: parse_timestamp(&get::<String>(row, "created_at")?),
            updated_at: parse_timestamp(&get::<String>(row, "updated_at")?),
            is_active: get::<i64>(row, "is_active")? != 0,
        })
    }

    fn row_to_message(row: &SqliteRow) -> Result<SessionMessage> {
        Ok(SessionMessage {
            id: get(row, "id")?,
            session_id: get(row, "session_id")?,
            role: get(row, "role")?,
            content: get(row, "content")?,
            tool_calls: get(row, "tool_calls")?,
            tool_call_id: get(row, "tool_call_id")?,
            created_at: parse_timestamp(&get::<String>(row, "created_at")?),
        })
    }
}

fn get<'r, T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T> {
    row.try_get(column)
        .map_err(|e| SwitchboardError::Storage(format!("{} column: {}", column, e)))
}

fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create_session(&self, session: &Session) -> Result<()> {
        debug!(session_id = %session.id, user_id = %session.user_id, "Creating session");
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, title, system_message, created_at, updated_at, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.title)
        .bind(&session.system_message)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .bind(session.is_active as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("INSERT session: {}", e)))?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Session> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SwitchboardError::Storage(format!("SELECT session: {}", e)))?;

        match row {
            Some(ref row) => Self::row_to_session(row),
            None => Err(SwitchboardError::SessionNotFound(session_id.to_string())),
        }
    }

    async fn get_session_with_messages(&self, session_id: &str) -> Result<SessionWithMessages> {
        let session = self.get_session(session_id).await?;
        let messages = self.get_messages(session_id).await?;
        Ok(SessionWithMessages { session, messages })
    }

    async fn list_user_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM sessions
            WHERE user_id = ?1 AND is_active = 1
            ORDER BY updated_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("LIST sessions: {}", e)))?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET title = ?1, updated_at = ?2, is_active = ?3 WHERE id = ?4",
        )
        .bind(&session.title)
        .bind(session.updated_at.to_rfc3339())
        .bind(session.is_active as i64)
        .bind(&session.id)
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("UPDATE session: {}", e)))?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        info!(session_id = session_id, "Soft-deleting session");
        sqlx::query("UPDATE sessions SET is_active = 0 WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SwitchboardError::Storage(format!("DELETE session: {}", e)))?;
        Ok(())
    }

    async fn add_message(&self, message: &SessionMessage) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO session_messages (session_id, role, content, tool_calls, tool_call_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&message.session_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(&message.tool_calls)
        .bind(&message.tool_call_id)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("INSERT message: {}", e)))?;

        sqlx::query("UPDATE sessions SET updated_at = ?1 WHERE id = ?2")
            .bind(message.created_at.to_rfc3339())
            .bind(&message.session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SwitchboardError::Storage(format!("bump updated_at: {}", e)))?;

        Ok(result.last_insert_rowid())
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>> {
        // id is the tie-break for messages created within the same second.
        let rows = sqlx::query(
            "SELECT * FROM session_messages WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SwitchboardError::Storage(format!("SELECT messages: {}", e)))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn clear_messages(&self, session_id: &str) -> Result<()> {
        debug!(session_id = session_id, "Clearing session messages");
        sqlx::query("DELETE FROM session_messages WHERE session_id = ?1 AND role != 'system'")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SwitchboardError::Storage(format!("CLEAR messages: {}", e)))?;
        Ok(())
    }

    async fn message_count(&self, session_id: &str) -> Result<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS cnt FROM session_messages WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| SwitchboardError::Storage(format!("COUNT messages: {}", e)))?;
        get(&row, "cnt")
    }
}
