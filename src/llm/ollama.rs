//! HTTP client for the Ollama chat endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::error::LlmError;
use super::ndjson::NdjsonStream;
use super::types::{ChatBackend, ChatRequest, ChunkStream};

/// Client for `POST /api/chat` with a chunked NDJSON response body.
pub struct OllamaClient {
    client: Client,
    url: String,
}

impl OllamaClient {
    /// Build a client for `http://{host}:{port}` with the given total
    /// request timeout. The timeout bounds the whole streaming call.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("http://{host}:{port}/api/chat"),
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, LlmError> {
        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        Ok(Box::pin(NdjsonStream::new(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_endpoint_url() {
        let client = OllamaClient::new("localhost", 11434, Duration::from_secs(3000)).unwrap();
        assert_eq!(client.url, "http://localhost:11434/api/chat");
    }
}
