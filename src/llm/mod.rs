//! Ollama chat backend: wire types, NDJSON stream decoding, HTTP client.

mod error;
mod ndjson;
mod ollama;
mod types;

pub use error::LlmError;
pub use ndjson::NdjsonStream;
pub use ollama::OllamaClient;
pub use types::{ChatBackend, ChatChunk, ChatMessage, ChatRequest, ChunkStream, Role};
