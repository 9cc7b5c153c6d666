//! Speech-to-text over hosted transcription APIs

use serde::Deserialize;

use crate::{Error, Result};

/// Hosted transcription service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Service {
    /// `OpenAI` Whisper, multipart upload
    Whisper,
    /// Deepgram prerecorded audio, raw WAV body
    Deepgram,
}

impl Service {
    /// Split a model identifier such as `deepgram/nova-2` into service and model
    fn from_model(model: &str) -> (Self, &str) {
        model
            .strip_prefix("deepgram/")
            .map_or((Self::Whisper, model), |m| (Self::Deepgram, m))
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Whisper => "Whisper",
            Self::Deepgram => "Deepgram",
        }
    }

    const fn host(self) -> &'static str {
        match self {
            Self::Whisper => "https://api.openai.com",
            Self::Deepgram => "https://api.deepgram.com",
        }
    }
}

#[derive(Deserialize)]
struct WhisperReply {
    text: String,
}

/// Only the first alternative of the first channel is used
#[derive(Deserialize)]
struct DeepgramReply {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    #[serde(default)]
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

impl DeepgramReply {
    fn into_transcript(self) -> String {
        self.results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default()
    }
}

/// Transcribes 16-bit mono WAV audio to text
#[derive(Debug, Clone)]
pub struct SpeechToText {
    http: reqwest::Client,
    service: Service,
    key: String,
    model: String,
    host: String,
}

impl SpeechToText {
    /// Create a transcriber from a model identifier
    ///
    /// `deepgram/<model>` selects Deepgram; anything else is a Whisper model.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn for_model(api_key: String, model: &str) -> Result<Self> {
        let (service, model) = Service::from_model(model);
        Self::build(service, api_key, model.to_string())
    }

    /// Transcribe with `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_whisper(api_key: String, model: String) -> Result<Self> {
        Self::build(Service::Whisper, api_key, model)
    }

    /// Transcribe with Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        Self::build(Service::Deepgram, api_key, model)
    }

    fn build(service: Service, key: String, model: String) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for speech input",
                service.name()
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            service,
            key,
            model,
            host: service.host().to_string(),
        })
    }

    /// Send requests to `base_url` instead of the service's public host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.host = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Transcribe WAV bytes
    ///
    /// An empty string means the service heard nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stt`] if the request fails or the reply is unreadable
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        let service = self.service.name();
        tracing::debug!(service, bytes = wav.len(), "transcribing");

        let request = match self.service {
            Service::Whisper => {
                let file = reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("speech.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .part("file", file)
                    .text("model", self.model.clone());
                self.http
                    .post(format!("{}/v1/audio/transcriptions", self.host))
                    .bearer_auth(&self.key)
                    .multipart(form)
            }
            Service::Deepgram => self
                .http
                .post(format!("{}/v1/listen", self.host))
                .query(&[("model", self.model.as_str()), ("punctuate", "true")])
                .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.key))
                .header(reqwest::header::CONTENT_TYPE, "audio/wav")
                .body(wav.to_vec()),
        };

        let response = request.send().await.map_err(|e| {
            tracing::warn!(service, error = %e, "transcription request failed");
            Error::Stt(format!("{service} request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(service, status = %status, body = %body, "transcription rejected");
            return Err(Error::Stt(format!("{service} API error {status}: {body}")));
        }

        let transcript = match self.service {
            Service::Whisper => response.json::<WhisperReply>().await.map(|r| r.text),
            Service::Deepgram => response
                .json::<DeepgramReply>()
                .await
                .map(DeepgramReply::into_transcript),
        }
        .map_err(|e| Error::Stt(format!("unreadable {service} reply: {e}")))?;

        tracing::info!(service, transcript = %transcript, "transcription complete");
        Ok(transcript.trim().to_string())
    }
}
