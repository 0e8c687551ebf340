//! Ollegram - a Telegram relay for a locally hosted Ollama instance.

pub mod access;
pub mod config;
pub mod llm;
pub mod relay;
pub mod session;
pub mod telegram;
