//! Remote assistant backend client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default backend endpoint
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/ask-zephyr";

/// Outgoing request: the prompt plus optional location context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuery {
    /// User prompt
    pub prompt: String,
    /// Nearby POI name; serialized as `null` when absent
    pub nearby_place: Option<String>,
}

/// Backend reply body
#[derive(Debug, Clone, Deserialize)]
struct AskResponse {
    response: String,
}

/// Answers prompts
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Send `query` and return the reply text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure and [`Error::Backend`] on
    /// a non-success status
    async fn ask(&self, query: &PendingQuery) -> Result<String>;
}

/// HTTP client for the `/ask-zephyr` wire contract
#[derive(Debug, Clone)]
pub struct HttpAssistant {
    client: reqwest::Client,
    url: String,
}

impl HttpAssistant {
    /// Create a client posting to `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a client with a preconfigured `reqwest::Client`
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Assistant for HttpAssistant {
    async fn ask(&self, query: &PendingQuery) -> Result<String> {
        tracing::debug!(
            url = %self.url,
            nearby_place = ?query.nearby_place,
            "sending query"
        );

        let response = self
            .client
            .post(&self.url)
            .json(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "assistant request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "assistant backend error");
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let reply: AskResponse = response.json().await?;
        tracing::debug!(chars = reply.response.len(), "received reply");
        Ok(reply.response)
    }
}
