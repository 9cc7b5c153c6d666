//! Text-to-speech over hosted synthesis APIs

use serde::Serialize;

use crate::{Error, Result};

/// Hosted synthesis service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Service {
    OpenAi,
    ElevenLabs,
}

impl Service {
    /// Split a model identifier such as `elevenlabs/eleven_monolingual_v1`
    fn from_model(model: &str) -> (Self, &str) {
        model
            .strip_prefix("elevenlabs/")
            .map_or((Self::OpenAi, model), |m| (Self::ElevenLabs, m))
    }

    const fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::ElevenLabs => "ElevenLabs",
        }
    }

    const fn host(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::ElevenLabs => "https://api.elevenlabs.io",
        }
    }
}

#[derive(Serialize)]
struct OpenAiSpeech<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f64,
}

#[derive(Serialize)]
struct ElevenLabsSpeech<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Synthesizes MP3 speech from reply text
#[derive(Debug, Clone)]
pub struct TextToSpeech {
    http: reqwest::Client,
    service: Service,
    key: String,
    model: String,
    /// Voice name (`OpenAI`) or voice ID (`ElevenLabs`)
    voice: String,
    /// Only sent to `OpenAI`
    speed: f64,
    host: String,
}

impl TextToSpeech {
    /// Create a synthesizer from a model identifier
    ///
    /// `elevenlabs/<model>` selects ElevenLabs with `voice` as the voice ID;
    /// anything else is an `OpenAI` model.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn for_model(api_key: String, model: &str, voice: String, speed: f64) -> Result<Self> {
        let (service, model) = Service::from_model(model);
        Self::build(service, api_key, model.to_string(), voice, speed)
    }

    /// Synthesize with `OpenAI`; `speed` is clamped to 0.25..=4.0
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_openai(api_key: String, voice: String, speed: f64, model: String) -> Result<Self> {
        Self::build(Service::OpenAi, api_key, model, voice, speed)
    }

    /// Synthesize with ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        Self::build(Service::ElevenLabs, api_key, model, voice_id, 1.0)
    }

    fn build(
        service: Service,
        key: String,
        model: String,
        voice: String,
        speed: f64,
    ) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for spoken replies",
                service.name()
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            service,
            key,
            model,
            voice,
            speed: speed.clamp(0.25, 4.0),
            host: service.host().to_string(),
        })
    }

    /// Send requests to `base_url` instead of the service's public host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.host = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize `text` into MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tts`] if the request fails or is rejected
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let service = self.service.name();
        tracing::debug!(service, chars = text.len(), "synthesizing speech");

        let request = match self.service {
            Service::OpenAi => self
                .http
                .post(format!("{}/v1/audio/speech", self.host))
                .bearer_auth(&self.key)
                .json(&OpenAiSpeech {
                    model: &self.model,
                    input: text,
                    voice: &self.voice,
                    speed: self.speed,
                }),
            Service::ElevenLabs => self
                .http
                .post(format!("{}/v1/text-to-speech/{}", self.host, self.voice))
                .header("xi-api-key", &self.key)
                .json(&ElevenLabsSpeech {
                    text,
                    model_id: &self.model,
                }),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Tts(format!("{service} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(service, status = %status, body = %body, "synthesis rejected");
            return Err(Error::Tts(format!("{service} API error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("{service} audio download failed: {e}")))?;
        tracing::debug!(service, bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
