//! Voice input and output
//!
//! [`VoiceController`] owns the Idle / Listening / Speaking state. Capture and
//! playback are pluggable through [`SpeechCapture`] and [`SpeechPlayback`].
//! Hosted STT/TTS clients are always available; microphone and speaker
//! adapters need the `audio` feature.

#[cfg(feature = "audio")]
mod capture;
mod console;
mod controller;
#[cfg(feature = "audio")]
mod playback;
mod stt;
mod tts;

use async_trait::async_trait;

use crate::Result;

#[cfg(feature = "audio")]
pub use capture::{MicrophoneCapture, SAMPLE_RATE, samples_to_wav};
pub use console::{ConsoleSpeaker, UnavailableCapture};
pub use controller::{CaptureOutcome, NO_SPEECH_DETECTED, VoiceController, VoiceState};
#[cfg(feature = "audio")]
pub use playback::TtsSpeaker;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

/// External capability turning speech into a transcript
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Capture one utterance
    ///
    /// An empty transcript means nothing was heard.
    ///
    /// # Errors
    ///
    /// Returns error if the capability fails
    async fn capture(&self) -> Result<String>;
}

/// External capability speaking text aloud
#[async_trait]
pub trait SpeechPlayback: Send + Sync {
    /// Speak `text`, resolving when playback finishes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str) -> Result<()>;

    /// Stop the current utterance immediately
    fn cancel(&self);
}
