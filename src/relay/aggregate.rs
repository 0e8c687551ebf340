//! Streaming response aggregation for one turn.
//!
//! Folds the decoded chunk sequence into a growing reply buffer and decides
//! per chunk whether the text is worth showing yet: a chunk that introduces
//! a sentence boundary, or the terminal chunk, triggers a flush.

use crate::llm::ChatChunk;

/// Characters that end a renderable unit of text.
const SENTENCE_DELIMITERS: [char; 4] = ['.', '\n', '!', '?'];

/// What the orchestrator should do after feeding one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing new to show.
    Continue,
    /// Render the accumulated text as a partial reply.
    Flush(String),
    /// Terminal chunk: `rendered` carries the footer, `reply` is the bare
    /// text that belongs in session history.
    Done { rendered: String, reply: String },
    /// Terminal chunk but the whole reply was empty; nothing to render or
    /// record.
    DoneEmpty,
}

/// Turn-local aggregation state. Create one per turn, feed every decoded
/// chunk through [`ResponseAggregator::push`], and act on the returned step.
pub struct ResponseAggregator {
    model: String,
    buffer: String,
    last_flushed: String,
}

impl ResponseAggregator {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            buffer: String::new(),
            last_flushed: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &ChatChunk) -> Step {
        let content = match &chunk.message {
            Some(message) => message.content.as_str(),
            None if chunk.done => "",
            // Bookkeeping chunk with nothing to say.
            None => return Step::Continue,
        };

        self.buffer.push_str(content);

        let flush_worthy = chunk.done || content.contains(&SENTENCE_DELIMITERS[..]);
        if !flush_worthy {
            return Step::Continue;
        }

        let text = self.buffer.trim();
        if text.is_empty() {
            return if chunk.done { Step::DoneEmpty } else { Step::Continue };
        }

        if chunk.done {
            let reply = text.to_string();
            let rendered = format!("{reply}{}", self.footer(chunk.total_duration));
            return Step::Done { rendered, reply };
        }

        if text == self.last_flushed {
            // Same visible text as last time; skip the no-op edit.
            return Step::Continue;
        }

        self.last_flushed = text.to_string();
        Step::Flush(self.last_flushed.clone())
    }

    fn footer(&self, total_duration: Option<u64>) -> String {
        let mut footer = format!("\n\n⚙️ {}", self.model);
        if let Some(nanos) = total_duration {
            let seconds = nanos as f64 / 1e9;
            footer.push_str(&format!("\nGenerated in {seconds:.2}s."));
        }
        footer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn content(text: &str) -> ChatChunk {
        ChatChunk {
            message: Some(ChatMessage::assistant(text)),
            done: false,
            total_duration: None,
        }
    }

    fn terminal(text: &str, total_duration: Option<u64>) -> ChatChunk {
        ChatChunk {
            message: Some(ChatMessage::assistant(text)),
            done: true,
            total_duration,
        }
    }

    #[test]
    fn flushes_on_sentence_boundary_and_terminal_chunk() {
        let mut agg = ResponseAggregator::new("llama3");

        assert_eq!(agg.push(&content("Hello")), Step::Continue);
        assert_eq!(
            agg.push(&content(" world.")),
            Step::Flush("Hello world.".to_string())
        );
        assert_eq!(
            agg.push(&terminal("", Some(2_500_000_000))),
            Step::Done {
                rendered: "Hello world.\n\n⚙️ llama3\nGenerated in 2.50s.".to_string(),
                reply: "Hello world.".to_string(),
            }
        );
    }

    #[test]
    fn question_and_exclamation_marks_flush() {
        let mut agg = ResponseAggregator::new("llama3");
        assert_eq!(agg.push(&content("Really?")), Step::Flush("Really?".to_string()));
        assert_eq!(agg.push(&content(" Yes!")), Step::Flush("Really? Yes!".to_string()));
    }

    #[test]
    fn newline_flushes() {
        let mut agg = ResponseAggregator::new("llama3");
        assert_eq!(agg.push(&content("line\n")), Step::Flush("line".to_string()));
    }

    #[test]
    fn plain_text_does_not_flush() {
        let mut agg = ResponseAggregator::new("llama3");
        assert_eq!(agg.push(&content("no boundary here")), Step::Continue);
        assert_eq!(agg.push(&content(" still none")), Step::Continue);
    }

    #[test]
    fn chunk_without_message_is_skipped() {
        let mut agg = ResponseAggregator::new("llama3");
        let chunk = ChatChunk {
            message: None,
            done: false,
            total_duration: None,
        };
        assert_eq!(agg.push(&chunk), Step::Continue);
    }

    #[test]
    fn whitespace_only_reply_never_renders() {
        let mut agg = ResponseAggregator::new("llama3");

        assert_eq!(agg.push(&content(" \n ")), Step::Continue);
        assert_eq!(agg.push(&content("\n")), Step::Continue);
        assert_eq!(agg.push(&terminal(" ", Some(1_000_000_000))), Step::DoneEmpty);
    }

    #[test]
    fn identical_trimmed_text_is_not_reflushed() {
        let mut agg = ResponseAggregator::new("llama3");

        assert_eq!(agg.push(&content("Hi.")), Step::Flush("Hi.".to_string()));
        // Trailing whitespace changes the buffer but not the visible text.
        assert_eq!(agg.push(&content("\n")), Step::Continue);
    }

    #[test]
    fn terminal_chunk_without_duration_omits_timing_line() {
        let mut agg = ResponseAggregator::new("llama3");
        agg.push(&content("Done."));

        match agg.push(&terminal("", None)) {
            Step::Done { rendered, reply } => {
                assert_eq!(reply, "Done.");
                assert_eq!(rendered, "Done.\n\n⚙️ llama3");
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn terminal_chunk_with_trailing_content_includes_it() {
        let mut agg = ResponseAggregator::new("llama3");
        agg.push(&content("Almost"));

        match agg.push(&terminal(" there.", Some(500_000_000))) {
            Step::Done { reply, rendered } => {
                assert_eq!(reply, "Almost there.");
                assert!(rendered.ends_with("Generated in 0.50s."));
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }
}
