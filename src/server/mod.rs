//! Assistant backend relay
//!
//! Serves the `/ask-zephyr` contract the client speaks and forwards prompts
//! to an OpenAI-compatible completion API. The nearby place becomes a system
//! message only when the prompt is actually about the user's location.

mod completion;
mod prompt;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use completion::{Completer, CompletionRequest, OpenAiCompleter};
pub use prompt::{ChatMessage, build_messages, is_location_related};

use crate::{Error, Result};

/// Incoming question
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    /// User prompt
    pub prompt: String,
    /// Nearby POI name, if the client attached one
    #[serde(default)]
    pub nearby_place: Option<String>,
    /// Maximum generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Top-k sampling cutoff
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

const fn default_max_tokens() -> u32 {
    150
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_top_p() -> f32 {
    0.8
}

const fn default_top_k() -> u32 {
    50
}

/// Successful answer
#[derive(Debug, Serialize)]
pub struct AskReply {
    /// Assistant text, trimmed
    pub response: String,
    /// Always `success`
    pub status: &'static str,
}

/// Failure body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// What went wrong
    pub detail: String,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Clone)]
struct RelayState {
    completer: Arc<dyn Completer>,
}

/// Build the relay router
pub fn router(completer: Arc<dyn Completer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask-zephyr", post(ask))
        .route("/health", get(health))
        .with_state(RelayState { completer })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ask(
    State(state): State<RelayState>,
    Json(request): Json<AskRequest>,
) -> std::result::Result<Json<AskReply>, (StatusCode, Json<ErrorBody>)> {
    if request.prompt.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                detail: "prompt must not be empty".to_string(),
            }),
        ));
    }

    let nearby_place = request.nearby_place.as_deref();
    let messages = build_messages(&request.prompt, nearby_place);
    tracing::info!(
        nearby_place = ?nearby_place,
        with_location = messages.len() > 1,
        "answering prompt"
    );

    let completion = CompletionRequest {
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        top_k: request.top_k,
    };

    match state.completer.complete(&completion).await {
        Ok(text) => Ok(Json(AskReply {
            response: text.trim().to_string(),
            status: "success",
        })),
        Err(e) => {
            tracing::error!(error = %e, "completion failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: e.to_string(),
                }),
            ))
        }
    }
}

/// HTTP server hosting the relay
pub struct RelayServer {
    port: u16,
    completer: Arc<dyn Completer>,
}

impl RelayServer {
    /// Create a server on `port`
    #[must_use]
    pub fn new(port: u16, completer: Arc<dyn Completer>) -> Self {
        Self { port, completer }
    }

    /// Run the relay until the process exits
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind relay server: {e}")))?;

        tracing::info!(port = self.port, "relay server listening");

        axum::serve(listener, router(self.completer))
            .await
            .map_err(|e| Error::Config(format!("relay server error: {e}")))?;

        Ok(())
    }
}
