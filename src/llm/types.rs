//! Wire types for the Ollama `/api/chat` endpoint.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// A streaming chat request. Serializes to the exact body the backend
/// expects: `{model, messages, stream: true}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One decoded line of the newline-delimited streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    /// Incremental content, absent on some bookkeeping chunks.
    #[serde(default)]
    pub message: Option<ChatMessage>,
    /// Terminal flag: the backend has finished generating.
    #[serde(default)]
    pub done: bool,
    /// Total generation time in nanoseconds, present on the terminal chunk.
    #[serde(default)]
    pub total_duration: Option<u64>,
}

/// A boxed stream of decoded chat chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// The seam between the turn orchestrator and the inference backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, LlmError>;
}
