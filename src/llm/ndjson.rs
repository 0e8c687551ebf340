//! Newline-delimited JSON stream decoder.
//!
//! Wraps a raw byte stream whose chunks arrive at arbitrary boundaries and
//! yields one deserialized value per complete line. Partial lines are
//! buffered across chunks; whitespace-only lines are skipped. A line that
//! fails to parse is fatal: the error is surfaced and the stream ends.
//!
//! A trailing buffer without a final newline is discarded at end of stream.
//! A well-formed chat response always ends with its terminal chunk on a
//! complete line, so a non-delimited tail means the connection was cut; the
//! transport layer reports that, not the decoder.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;

use super::error::LlmError;

/// A stream adapter decoding `T` values from newline-delimited JSON bytes.
pub struct NdjsonStream<S, T> {
    inner: S,
    buffer: Vec<u8>,
    done: bool,
    _marker: PhantomData<T>,
}

impl<S, T> NdjsonStream<S, T> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<S, T, E> Stream for NdjsonStream<S, T>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    T: DeserializeOwned + Unpin,
    E: Into<LlmError>,
{
    type Item = Result<T, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            // Try to extract a complete line from the buffer.
            if let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=newline).collect();
                let line = line[..line.len() - 1].trim_ascii();

                if line.is_empty() {
                    continue;
                }

                return match serde_json::from_slice::<T>(line) {
                    Ok(value) => Poll::Ready(Some(Ok(value))),
                    Err(e) => {
                        // Malformed line: report and stop decoding.
                        self.done = true;
                        Poll::Ready(Some(Err(LlmError::Decode(e))))
                    }
                };
            }

            // Need more data from the underlying stream.
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    // A trailing partial line is dropped, not emitted.
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    use crate::llm::ChatChunk;

    fn bytes_stream(
        chunks: Vec<&str>,
    ) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + Unpin {
        let chunks: Vec<Result<Bytes, std::convert::Infallible>> = chunks
            .into_iter()
            .map(|s| Ok(Bytes::from(s.to_string())))
            .collect();
        futures::stream::iter(chunks)
    }

    async fn collect_contents(chunks: Vec<&str>) -> Vec<String> {
        let mut stream = NdjsonStream::<_, ChatChunk>::new(bytes_stream(chunks));
        let mut contents = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            contents.push(chunk.message.map(|m| m.content).unwrap_or_default());
        }
        contents
    }

    #[tokio::test]
    async fn decodes_line_per_chunk() {
        let contents = collect_contents(vec![
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
        ])
        .await;
        assert_eq!(contents, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_matter() {
        let payload = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"a\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"b\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"c\"},\"done\":true}\n",
        );

        // Whole payload at once, byte-at-a-time, and an awkward mid-line
        // split must all decode to the same sequence.
        let whole = collect_contents(vec![payload]).await;

        let singles: Vec<String> = payload.chars().map(|c| c.to_string()).collect();
        let tiny = collect_contents(singles.iter().map(String::as_str).collect()).await;

        let (left, right) = payload.split_at(payload.len() / 2 + 3);
        let split = collect_contents(vec![left, right]).await;

        assert_eq!(whole, vec!["a", "b", "c"]);
        assert_eq!(tiny, whole);
        assert_eq!(split, whole);
    }

    #[tokio::test]
    async fn skips_blank_lines() {
        let contents = collect_contents(vec![
            "\n  \n{\"message\":{\"role\":\"assistant\",\"content\":\"x\"},\"done\":false}\n\n",
        ])
        .await;
        assert_eq!(contents, vec!["x"]);
    }

    #[tokio::test]
    async fn handles_crlf_line_endings() {
        let contents = collect_contents(vec![
            "{\"message\":{\"role\":\"assistant\",\"content\":\"x\"},\"done\":false}\r\n",
        ])
        .await;
        assert_eq!(contents, vec!["x"]);
    }

    #[tokio::test]
    async fn malformed_line_is_a_fatal_error() {
        let mut stream = NdjsonStream::<_, ChatChunk>::new(bytes_stream(vec![
            "{\"message\":{\"role\":\"assistant\",\"content\":\"ok\"},\"done\":false}\n",
            "not json at all\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"never\"},\"done\":false}\n",
        ]));

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
        // The stream ends after the error; the third line is never decoded.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn trailing_partial_line_is_discarded() {
        let mut stream = NdjsonStream::<_, ChatChunk>::new(bytes_stream(vec![
            "{\"message\":{\"role\":\"assistant\",\"content\":\"x\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assi",
        ]));

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn handles_empty_stream() {
        let mut stream = NdjsonStream::<_, ChatChunk>::new(bytes_stream(vec![]));
        assert!(stream.next().await.is_none());
    }
}
