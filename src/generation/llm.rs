//! LLM client for OpenAI-compatible chat-completions providers

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::GenerationProvider;
use crate::error::GenerationError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration for an LLM API provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model requested for every completion
    pub model: String,
    /// Extra headers to include in requests (e.g., X-Title)
    pub extra_headers: Vec<(String, String)>,
    /// Upper bound on a single request
    pub timeout: Duration,
}

impl ProviderConfig {
    /// OpenAI provider configuration
    pub fn openai(api_key: String, model: String) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model,
            extra_headers: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// OpenRouter provider configuration
    pub fn openrouter(api_key: String, model: String) -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.to_string(),
            api_key,
            model,
            extra_headers: vec![("X-Title".to_string(), "Smart Quiz".to_string())],
            timeout: Duration::from_secs(30),
        }
    }

    /// Any OpenAI-compatible endpoint
    pub fn with_url(base_url: impl Into<String>, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            model,
            extra_headers: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// LLM API client
#[derive(Clone)]
pub struct LlmClient {
    client: Arc<Client>,
    provider: ProviderConfig,
}

impl LlmClient {
    /// Create a client for the given provider
    pub fn new(provider: ProviderConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(provider.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            provider,
        })
    }

    /// Send a single-turn chat completion and return the reply text
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.provider.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let mut req_builder = self
            .client
            .post(format!("{}/chat/completions", self.provider.base_url.trim_end_matches('/')))
            .bearer_auth(&self.provider.api_key);
        for (key, value) in &self.provider.extra_headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let response = req_builder.json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.provider.timeout)
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.provider.timeout)
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_safe(&body, 500).to_string(),
            });
        }

        let raw: Value = serde_json::from_str(&body).map_err(|e| {
            GenerationError::InvalidResponse(format!("{} (body: {})", e, truncate_safe(&body, 500)))
        })?;

        let content = extract_content(&raw).ok_or_else(|| {
            GenerationError::InvalidResponse(format!("no message content (body: {})", truncate_safe(&body, 500)))
        })?;

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl GenerationProvider for LlmClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        debug!(model = %self.provider.model, max_tokens, "Requesting completion");
        self.complete(prompt, max_tokens).await
    }
}

/// Pull the first choice's text out of a completion response.
///
/// Handles chat responses with string content, chat responses with an
/// array of content parts, and legacy completions with `choices[0].text`.
pub fn extract_content(raw: &Value) -> Option<String> {
    let choice = raw.get("choices")?.as_array()?.first()?;

    if let Some(content) = choice.get("message").and_then(|m| m.get("content")) {
        return match content {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let text: Vec<&str> = parts
                    .iter()
                    .filter(|p| p.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text.join(""))
                }
            }
            _ => None,
        };
    }

    choice.get("text").and_then(|t| t.as_str()).map(str::to_string)
}

/// Truncate to at most `max` bytes without splitting a character
pub fn truncate_safe(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_string_content() {
        let raw = json!({"choices": [{"message": {"role": "assistant", "content": "What is 2+2?"}}]});
        assert_eq!(extract_content(&raw).as_deref(), Some("What is 2+2?"));
    }

    #[test]
    fn test_extract_content_parts() {
        let raw = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "Hello "},
            {"type": "image_url", "image_url": {"url": "x"}},
            {"type": "text", "text": "world"}
        ]}}]});
        assert_eq!(extract_content(&raw).as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_extract_legacy_completion() {
        let raw = json!({"choices": [{"text": "  legacy  "}]});
        assert_eq!(extract_content(&raw).as_deref(), Some("  legacy  "));
    }

    #[test]
    fn test_extract_missing_choices() {
        assert!(extract_content(&json!({"error": "nope"})).is_none());
        assert!(extract_content(&json!({"choices": []})).is_none());
    }

    #[test]
    fn test_truncate_safe_on_char_boundary() {
        assert_eq!(truncate_safe("héllo", 2), "h");
        assert_eq!(truncate_safe("short", 50), "short");
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            max_tokens: 100,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["max_tokens"], 100);
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
