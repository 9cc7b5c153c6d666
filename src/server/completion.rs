//! Upstream chat completion client (OpenAI-compatible)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompt::ChatMessage;
use crate::{Error, Result};

/// Sampling parameters and messages for one completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation so far
    pub messages: Vec<ChatMessage>,
    /// Maximum generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Top-k sampling cutoff, forwarded only by upstreams that accept it
    pub top_k: u32,
}

/// Produces assistant text for a completion request
#[async_trait]
pub trait Completer: Send + Sync {
    /// Generate a reply
    ///
    /// # Errors
    ///
    /// Returns error if the upstream call fails
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// `top_k` is not part of the `OpenAI` API and is only sent when enabled
#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

impl<'a> ChatCompletionBody<'a> {
    fn new(model: &'a str, request: &'a CompletionRequest, send_top_k: bool) -> Self {
        Self {
            model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: send_top_k.then_some(request.top_k),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Calls `{base_url}/v1/chat/completions`
///
/// Works with `OpenAI` and self-hosted servers speaking the same API (vLLM,
/// llama.cpp, Ollama).
#[derive(Debug, Clone)]
pub struct OpenAiCompleter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    send_top_k: bool,
}

impl OpenAiCompleter {
    /// Create a client for `model` at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            send_top_k: false,
        }
    }

    /// Forward `top_k` upstream (vLLM, llama.cpp); `OpenAI` rejects it
    #[must_use]
    pub fn with_top_k(mut self, enabled: bool) -> Self {
        self.send_top_k = enabled;
        self
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %self.model, "requesting completion");

        let mut builder = self.client.post(&url).json(&ChatCompletionBody::new(
            &self.model,
            request,
            self.send_top_k,
        ));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Upstream(format!("completion API error {status}: {body}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid completion response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Upstream("completion returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
            }],
            max_tokens: 150,
            temperature: 0.5,
            top_p: 0.75,
            top_k: 50,
        }
    }

    #[test]
    fn body_omits_top_k_by_default() {
        let request = request();
        let json = serde_json::to_value(ChatCompletionBody::new("gpt-4o-mini", &request, false))
            .unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["top_p"], 0.75);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("top_k").is_none());
    }

    #[test]
    fn body_carries_top_k_when_enabled() {
        let request = request();
        let json =
            serde_json::to_value(ChatCompletionBody::new("zephyr", &request, true)).unwrap();
        assert_eq!(json["top_k"], 50);
    }

    #[test]
    fn top_k_is_off_unless_requested() {
        let completer = OpenAiCompleter::new("http://localhost:8080/", "zephyr", Some(String::new()));
        assert!(!completer.send_top_k);
        assert!(completer.api_key.is_none());
        assert_eq!(completer.base_url, "http://localhost:8080");
        assert!(completer.with_top_k(true).send_top_k);
    }
}
