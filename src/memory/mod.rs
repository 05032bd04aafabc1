//! Memory module - conversation state behind a uniform interface
//!
//! The agent reads and writes conversation history through the `Memory`
//! trait. Two interchangeable backends are provided: `BufferMemory` keeps
//! messages in process, `SessionMemory` persists them through a
//! `SessionRepository`. The agent never branches on which backend is in
//! use.

mod buffer;
mod repository;
mod service;
mod session;
mod session_memory;
mod sqlite;

pub use buffer::BufferMemory;
pub use repository::SessionRepository;
pub use service::SessionService;
pub use session::{new_session_id, Session, SessionMessage, SessionWithMessages};
pub use session_memory::SessionMemory;
pub use sqlite::SqliteSessionRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::Message;

/// The capability set the agent relies on.
#[async_trait]
pub trait Memory: Send + Sync {
    /// All messages in order. When a system message is configured it is
    /// always first.
    async fn messages(&self) -> Result<Vec<Message>>;

    /// Append a message.
    async fn add(&self, message: Message) -> Result<()>;

    /// Remove all conversation messages, keeping the system message.
    async fn clear(&self) -> Result<()>;
}
