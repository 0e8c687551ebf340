//! Per-user conversation sessions.
//!
//! The store is the only long-lived shared state in the process. Every
//! operation takes the single store gate internally; the gate protects map
//! mutation only and is never held across network I/O.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::llm::{ChatMessage, ChatRequest};

/// Sessions keep at most this many messages; older entries are trimmed.
pub const MAX_HISTORY_MESSAGES: usize = 50;

/// One user's conversation: the model in use plus ordered history.
#[derive(Debug, Clone)]
pub struct Session {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(model: String) -> Self {
        let now = Utc::now();
        Self {
            model,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > MAX_HISTORY_MESSAGES {
            let excess = self.messages.len() - MAX_HISTORY_MESSAGES;
            self.messages.drain(..excess);
        }
        self.updated_at = Utc::now();
    }
}

/// Synchronized map of user ID to session. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user's prompt (creating the session on first contact)
    /// and snapshot the backend payload, all under one lock acquisition so
    /// no other task's append can land between the two.
    pub async fn push_prompt(&self, user_id: i64, model: &str, content: String) -> ChatRequest {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(model.to_string()));
        session.push(ChatMessage::user(content));
        ChatRequest::new(session.model.clone(), session.messages.clone())
    }

    /// Append the assistant's completed reply. Returns `false` if the user
    /// has no session, which means a turn finished without its prompt
    /// having been recorded.
    pub async fn append_assistant_message(&self, user_id: i64, content: String) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user_id) {
            Some(session) => {
                session.push(ChatMessage::assistant(content));
                true
            }
            None => false,
        }
    }

    /// The conversation so far, if any.
    pub async fn history(&self, user_id: i64) -> Option<Vec<ChatMessage>> {
        let sessions = self.sessions.lock().await;
        sessions.get(&user_id).map(|s| s.messages.clone())
    }

    /// Clear the user's conversation. Returns `false` if there was none.
    pub async fn reset(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&user_id).is_some()
    }
}
