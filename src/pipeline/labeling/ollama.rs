use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ChatClient, ChatMessage};
use super::TransportError;

/// Default Ollama daemon address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama HTTP client for local chat inference.
pub struct OllamaChatClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaChatClient {
    /// Create a client pointing at an Ollama instance.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    /// Local instance at localhost:11434 with a 5-minute timeout.
    pub fn default_local() -> Result<Self, TransportError> {
        Self::new(DEFAULT_OLLAMA_URL, 300)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installed model names, as reported by `/api/tags`.
    pub fn list_models(&self) -> Result<Vec<String>, TransportError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| TransportError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn map_send_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_connect() {
            TransportError::OllamaConnection(self.base_url.clone())
        } else if e.is_timeout() {
            TransportError::HttpClient(format!(
                "Request timed out after {}s",
                self.timeout_secs
            ))
        } else {
            TransportError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl ChatClient for OllamaChatClient {
    fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, TransportError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| TransportError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, TransportError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }
}

/// Scripted chat client for testing. Replies are consumed in order; once the
/// script runs out the last reply repeats. `None` entries simulate a
/// transport failure.
pub struct MockChatClient {
    replies: Mutex<VecDeque<Option<String>>>,
    last: Mutex<Option<String>>,
    calls: AtomicUsize,
    available_models: Vec<String>,
}

impl MockChatClient {
    /// Always answers with `response`.
    pub fn new(response: &str) -> Self {
        Self::scripted(vec![Some(response.to_string())])
    }

    /// Always fails at the transport level.
    pub fn unreachable() -> Self {
        Self::scripted(vec![None])
    }

    pub fn scripted(replies: Vec<Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            available_models: vec!["llama3:latest".to_string()],
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Number of `chat` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatClient for MockChatClient {
    fn chat(
        &self,
        _messages: &[ChatMessage],
        _model: &str,
        _temperature: f32,
    ) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut replies = self
            .replies
            .lock()
            .map_err(|_| TransportError::HttpClient("mock lock poisoned".into()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| TransportError::HttpClient("mock lock poisoned".into()))?;

        let reply = match replies.pop_front() {
            Some(next) => {
                *last = next.clone();
                next
            }
            None => last.clone(),
        };

        reply.ok_or_else(|| TransportError::OllamaConnection(DEFAULT_OLLAMA_URL.to_string()))
    }

    fn is_model_available(&self, model: &str) -> Result<bool, TransportError> {
        Ok(self.available_models.iter().any(|m| m.starts_with(model)))
    }
}
