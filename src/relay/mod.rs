//! Turn orchestration: one user prompt, one streamed reply.

mod aggregate;

pub use aggregate::{ResponseAggregator, Step};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{ChatBackend, LlmError};
use crate::session::SessionStore;

/// Errors that abort a turn.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("chat delivery failed: {0}")]
    Chat(#[from] teloxide::RequestError),

    /// The user already has a turn in flight.
    #[error("a reply for this user is already in progress")]
    Busy,
}

/// Where flushed reply text goes. The sink owns the outbound message
/// identity for the whole turn: the first render sends a new message,
/// every later render edits that same message.
#[async_trait]
pub trait ReplySink: Send {
    async fn render(&mut self, text: &str) -> Result<(), RelayError>;
}

/// Drives one turn end to end: records the prompt, opens the streaming
/// call, folds chunks through the aggregator, and commits the finished
/// reply back into the session.
pub struct Relay<B> {
    store: SessionStore,
    backend: B,
    model: String,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl<B: ChatBackend> Relay<B> {
    pub fn new(store: SessionStore, backend: B, model: impl Into<String>) -> Self {
        Self {
            store,
            backend,
            model: model.into(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run one turn for `user_id`. Rejects with [`RelayError::Busy`] when a
    /// previous turn for the same user has not finished, so two turns can
    /// never interleave edits onto the same outbound message.
    pub async fn run_turn(
        &self,
        user_id: i64,
        prompt: String,
        sink: &mut dyn ReplySink,
    ) -> Result<(), RelayError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, user_id).ok_or(RelayError::Busy)?;

        // Append the prompt and snapshot the payload under the store gate,
        // then release it before any network I/O.
        let request = self
            .store
            .push_prompt(user_id, &self.model, prompt)
            .await;

        let mut stream = self.backend.chat_stream(request).await?;
        let mut aggregator = ResponseAggregator::new(&self.model);

        while let Some(chunk) = stream.next().await {
            match aggregator.push(&chunk?) {
                Step::Continue => {}
                Step::Flush(text) => sink.render(&text).await?,
                Step::Done { rendered, reply } => {
                    sink.render(&rendered).await?;
                    if !self.store.append_assistant_message(user_id, reply).await {
                        warn!(user_id, "turn completed for a user with no session");
                    }
                    return Ok(());
                }
                Step::DoneEmpty => {
                    debug!(user_id, "model produced an empty reply");
                    return Ok(());
                }
            }
        }

        // Clean EOF without a terminal chunk means the response was cut off.
        Err(LlmError::Truncated.into())
    }
}

/// RAII marker for a user's in-flight turn; released on drop so a failed
/// turn cannot leave the user permanently blocked.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<i64>>>,
    user_id: i64,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<i64>>>, user_id: i64) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(user_id) {
            return None;
        }
        Some(Self {
            in_flight: Arc::clone(in_flight),
            user_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.user_id);
    }
}
