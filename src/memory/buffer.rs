//! In-process conversation buffer.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::llm::Message;

use super::Memory;

struct BufferState {
    system_message: Message,
    messages: Vec<Message>,
}

/// Stores conversation messages in memory.
///
/// An optional maximum-message cap drops the oldest non-system messages
/// (FIFO) once exceeded. The system message never counts against the cap
/// and survives `clear()`.
pub struct BufferMemory {
    state: RwLock<BufferState>,
    max_messages: usize,
}

impl BufferMemory {
    /// Create a new buffer seeded with a system message. An empty system
    /// message means no system message is emitted.
    pub fn new(system_message: Message) -> Self {
        Self {
            state: RwLock::new(BufferState {
                system_message,
                messages: Vec::new(),
            }),
            max_messages: 0,
        }
    }

    /// Cap the number of retained conversation messages (0 = unlimited).
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Number of conversation messages (excluding the system message).
    pub async fn count(&self) -> usize {
        self.state.read().await.messages.len()
    }

    /// The configured system message.
    pub async fn system_message(&self) -> Message {
        self.state.read().await.system_message.clone()
    }

    /// Replace the system message.
    pub async fn set_system_message(&self, message: Message) {
        self.state.write().await.system_message = message;
    }
}

#[async_trait]
impl Memory for BufferMemory {
    async fn messages(&self) -> Result<Vec<Message>> {
        let state = self.state.read().await;
        let mut all = Vec::with_capacity(state.messages.len() + 1);
        if !state.system_message.content.is_empty() {
            all.push(state.system_message.clone());
        }
        all.extend(state.messages.iter().cloned());
        Ok(all)
    }

    async fn add(&self, message: Message) -> Result<()> {
        let mut state = self.state.write().await;
        state.messages.push(message);

        if self.max_messages > 0 && state.messages.len() > self.max_messages {
            let drop_count = state.messages.len() - self.max_messages;
            state.messages.drain(..drop_count);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.state.write().await.messages.clear();
        Ok(())
    }
}
