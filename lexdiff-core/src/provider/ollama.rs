//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use async_trait::async_trait;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl OllamaProvider {
    /// Creates a new Ollama provider with the specified config.
    pub fn new(config: &crate::Config) -> Self {
        Self {
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.provider.request_timeout_secs),
        }
    }

    /// Runs a request future under the configured timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);

        // Convert to Ollama-specific request format
        let ollama_request = OllamaChatRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            options: {
                let mut opts = HashMap::new();
                opts.insert("temperature".to_string(), serde_json::json!(request.temperature));
                Some(opts)
            },
            stream: true,
        };

        self.bounded(async {
            let response = self.http_client
                .post(&url)
                .json(&ollama_request)
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(ProviderError::Api(error_text));
            }

            let mut stream = response.bytes_stream();
            let mut buffer = Vec::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = chunk_result?;
                buffer.extend_from_slice(&chunk);

                while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();

                    if line.len() <= 1 {
                        continue;
                    }

                    let line_str = String::from_utf8_lossy(&line[..line.len() - 1]);
                    if let Some(response) = parse_chat_line(&line_str)? {
                        callback(response);
                    }
                }
            }

            // A final line without a trailing newline is still a valid chunk.
            if !buffer.is_empty() {
                let line_str = String::from_utf8_lossy(&buffer);
                if let Some(response) = parse_chat_line(&line_str)? {
                    callback(response);
                }
            }

            Ok::<(), ProviderError>(())
        })
        .await
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        self.bounded(async {
            let response = self.http_client
                .post(&url)
                .json(&embed_request)
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(ProviderError::Api(error_text));
            }

            let embed_response = response.json::<EmbedResponse>().await?;

            embed_response.embeddings
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Other(format!("No embeddings returned by {}", model)))
        })
        .await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);

        self.bounded(async {
            let response = self.http_client.get(&url).send().await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(ProviderError::Api(error_text));
            }

            let tags = response.json::<OllamaTagsResponse>().await?;
            Ok::<_, ProviderError>(tags.models)
        })
        .await
    }
}

/// Parses one NDJSON line of a streamed chat response.
///
/// Blank or unrecognized lines yield `None`; an `{"error": ...}` line is
/// surfaced as an API error.
fn parse_chat_line(line: &str) -> Result<Option<ChatResponse>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Ok(ollama_response) = serde_json::from_str::<OllamaChatResponse>(line) {
        return Ok(Some(ChatResponse {
            model: ollama_response.model,
            content: ollama_response.message.content,
            done: ollama_response.done,
        }));
    }

    if let Ok(error) = serde_json::from_str::<OllamaErrorLine>(line) {
        return Err(ProviderError::Api(error.error));
    }

    Ok(None)
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatResponse {
    model: String,
    #[serde(default)]
    created_at: String,
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    done_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaErrorLine {
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_line() {
        let line = r#"{"model":"qwen3:8b","created_at":"2025-01-01T00:00:00Z","message":{"role":"assistant","content":"Art"},"done":false}"#;
        let chunk = parse_chat_line(line).unwrap().unwrap();
        assert_eq!(chunk.model, "qwen3:8b");
        assert_eq!(chunk.content, "Art");
        assert!(!chunk.done);
    }

    #[test]
    fn test_parse_chat_line_done() {
        let line = r#"{"model":"qwen3:8b","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#;
        let chunk = parse_chat_line(line).unwrap().unwrap();
        assert!(chunk.done);
        assert!(chunk.content.is_empty());
    }

    #[test]
    fn test_parse_chat_line_error() {
        let err = parse_chat_line(r#"{"error":"model 'x' not found"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Api(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_parse_chat_line_ignores_noise() {
        assert!(parse_chat_line("   ").unwrap().is_none());
        assert!(parse_chat_line("not json").unwrap().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let mut config = crate::Config::default();
        config.llm.base_url = "http://localhost:11434/".to_string();
        let provider = OllamaProvider::new(&config);
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let mut config = crate::Config::default();
        config.provider.request_timeout_secs = 0;
        let provider = OllamaProvider::new(&config);

        let result: Result<()> = provider
            .bounded(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Timeout(0))));
    }
}
