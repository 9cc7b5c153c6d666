//! Assistant backend client tests against in-process HTTP servers

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use geo_assistant::server::{Completer, CompletionRequest, OpenAiCompleter};
use geo_assistant::voice::{SpeechToText, TextToSpeech};
use geo_assistant::{Assistant, Error, ErrorKind, HttpAssistant, PendingQuery};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port and return its base URL
async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

type Captured = Arc<Mutex<Vec<Value>>>;

fn recording_backend(captured: Captured) -> Router {
    Router::new()
        .route(
            "/ask-zephyr",
            post(|State(captured): State<Captured>, Json(body): Json<Value>| async move {
                captured.lock().unwrap().push(body);
                Json(json!({ "response": "Welcome to Old Town Square." }))
            }),
        )
        .with_state(captured)
}

#[tokio::test]
async fn posts_prompt_and_null_place() {
    let captured = Captured::default();
    let base = spawn_server(recording_backend(Arc::clone(&captured))).await;
    let assistant = HttpAssistant::new(format!("{base}/ask-zephyr"));

    let reply = assistant
        .ask(&PendingQuery {
            prompt: "Hello".to_string(),
            nearby_place: None,
        })
        .await
        .unwrap();
    assert_eq!(reply, "Welcome to Old Town Square.");

    let bodies = captured.lock().unwrap().clone();
    assert_eq!(bodies, vec![json!({ "prompt": "Hello", "nearby_place": null })]);
}

#[tokio::test]
async fn posts_nearby_place_when_present() {
    let captured = Captured::default();
    let base = spawn_server(recording_backend(Arc::clone(&captured))).await;
    let assistant = HttpAssistant::new(format!("{base}/ask-zephyr"));

    assistant
        .ask(&PendingQuery {
            prompt: "What is this place?".to_string(),
            nearby_place: Some("Old Town Square".to_string()),
        })
        .await
        .unwrap();

    let bodies = captured.lock().unwrap().clone();
    assert_eq!(bodies[0]["nearby_place"], "Old Town Square");
}

#[tokio::test]
async fn non_success_status_is_backend_error() {
    let router = Router::new().route(
        "/ask-zephyr",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
    );
    let base = spawn_server(router).await;
    let assistant = HttpAssistant::new(format!("{base}/ask-zephyr"));

    let err = assistant
        .ask(&PendingQuery {
            prompt: "Hello".to_string(),
            nearby_place: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        Error::Backend { status: 500, body } if body == "model overloaded"
    ));
    assert_eq!(err.kind(), Some(ErrorKind::BackendError));
    assert_eq!(
        err.to_string(),
        "API request failed (500): model overloaded"
    );
}

#[tokio::test]
async fn unreachable_backend_is_network_failure() {
    // Bind then release a port so nothing is listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let assistant = HttpAssistant::new(format!("http://{addr}/ask-zephyr"));
    let err = assistant
        .ask(&PendingQuery {
            prompt: "Hello".to_string(),
            nearby_place: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http(_)));
    assert_eq!(err.kind(), Some(ErrorKind::NetworkFailure));
}

struct EchoCompleter;

#[async_trait]
impl Completer for EchoCompleter {
    async fn complete(&self, request: &CompletionRequest) -> geo_assistant::Result<String> {
        let context = request
            .messages
            .iter()
            .find(|m| m.role == "system")
            .map_or("none", |m| m.content.as_str());
        Ok(format!("  context: {context}  "))
    }
}

#[tokio::test]
async fn client_and_relay_speak_the_same_contract() {
    let base = spawn_server(geo_assistant::server::router(Arc::new(EchoCompleter))).await;
    let assistant = HttpAssistant::new(format!("{base}/ask-zephyr"));

    let reply = assistant
        .ask(&PendingQuery {
            prompt: "What is this place?".to_string(),
            nearby_place: Some("Charles Bridge".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(
        reply,
        "context: User is near Charles Bridge. Answer the questions concisely"
    );
}

/// Authorization header and JSON body of each upstream call
type Upstream = Arc<Mutex<Vec<(Option<String>, Value)>>>;

fn fake_chat_upstream(seen: Upstream, reply: Value) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(
                move |State(seen): State<Upstream>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().unwrap().push((auth, body));
                    Json(reply)
                },
            ),
        )
        .with_state(seen)
}

fn completion(top_k: u32) -> CompletionRequest {
    CompletionRequest {
        messages: geo_assistant::server::build_messages("What is this place?", Some("Charles Bridge")),
        max_tokens: 150,
        temperature: 0.7,
        top_p: 0.8,
        top_k,
    }
}

#[tokio::test]
async fn completer_sends_openai_body_with_bearer_key() {
    let seen = Upstream::default();
    let reply = json!({ "choices": [{ "message": { "role": "assistant", "content": "A Gothic bridge." } }] });
    let base = spawn_server(fake_chat_upstream(Arc::clone(&seen), reply)).await;

    let completer = OpenAiCompleter::new(format!("{base}/"), "gpt-4o-mini", Some("sk-test".to_string()));
    let text = completer.complete(&completion(50)).await.unwrap();
    assert_eq!(text, "A Gothic bridge.");

    let (auth, body) = seen.lock().unwrap().pop().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["max_tokens"], 150);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "What is this place?");
    assert!(body.get("top_k").is_none());
}

#[tokio::test]
async fn completer_forwards_top_k_when_enabled_and_skips_blank_key() {
    let seen = Upstream::default();
    let reply = json!({ "choices": [{ "message": { "content": "ok" } }] });
    let base = spawn_server(fake_chat_upstream(Arc::clone(&seen), reply)).await;

    let completer = OpenAiCompleter::new(base, "zephyr-7b", Some(String::new())).with_top_k(true);
    completer.complete(&completion(10)).await.unwrap();

    let (auth, body) = seen.lock().unwrap().pop().unwrap();
    assert!(auth.is_none());
    assert_eq!(body["top_k"], 10);
}

#[tokio::test]
async fn completer_error_status_is_upstream_error() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unrecognized request argument supplied: top_k",
            )
        }),
    );
    let base = spawn_server(router).await;

    let err = OpenAiCompleter::new(base, "gpt-4o-mini", None)
        .complete(&completion(50))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn completer_without_choices_is_upstream_error() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );
    let base = spawn_server(router).await;

    let err = OpenAiCompleter::new(base, "gpt-4o-mini", None)
        .complete(&completion(50))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg.contains("no choices")));
}

#[tokio::test]
async fn relay_over_openai_upstream_returns_trimmed_reply() {
    let seen = Upstream::default();
    let reply = json!({ "choices": [{ "message": { "content": "\n  Charles Bridge spans the Vltava.  \n" } }] });
    let upstream = spawn_server(fake_chat_upstream(Arc::clone(&seen), reply)).await;

    let completer = OpenAiCompleter::new(upstream, "gpt-4o-mini", Some("sk-test".to_string()));
    let relay = spawn_server(geo_assistant::server::router(Arc::new(completer))).await;
    let assistant = HttpAssistant::new(format!("{relay}/ask-zephyr"));

    let reply = assistant
        .ask(&PendingQuery {
            prompt: "What is this place?".to_string(),
            nearby_place: Some("Charles Bridge".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(reply, "Charles Bridge spans the Vltava.");

    let (_, body) = seen.lock().unwrap().pop().unwrap();
    assert!(body.get("top_k").is_none());
}

#[tokio::test]
async fn whisper_transcribes_through_base_url() {
    let router = Router::new().route(
        "/v1/audio/transcriptions",
        post(|| async { Json(json!({ "text": "what is this place" })) }),
    );
    let base = spawn_server(router).await;

    let stt = SpeechToText::new_whisper("sk-test".to_string(), "whisper-1".to_string())
        .unwrap()
        .with_base_url(base);
    let text = stt.transcribe(b"RIFF....WAVE").await.unwrap();
    assert_eq!(text, "what is this place");
}

#[tokio::test]
async fn tts_error_status_is_reported() {
    let router = Router::new().route(
        "/v1/audio/speech",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
    );
    let base = spawn_server(router).await;

    let tts = TextToSpeech::new_openai(
        "sk-test".to_string(),
        "alloy".to_string(),
        1.0,
        "tts-1".to_string(),
    )
    .unwrap()
    .with_base_url(base);
    let err = tts.synthesize("hello").await.unwrap_err();
    assert!(matches!(err, Error::Tts(ref msg) if msg.contains("401")));
}

#[tokio::test]
async fn tts_returns_audio_bytes() {
    let router = Router::new().route(
        "/v1/audio/speech",
        post(|| async { vec![0xFF_u8, 0xFB, 0x90, 0x00] }),
    );
    let base = spawn_server(router).await;

    let tts = TextToSpeech::for_model(
        "sk-test".to_string(),
        "tts-1",
        "alloy".to_string(),
        1.0,
    )
    .unwrap()
    .with_base_url(base);
    assert_eq!(tts.synthesize("hello").await.unwrap(), vec![0xFF, 0xFB, 0x90, 0x00]);
}
