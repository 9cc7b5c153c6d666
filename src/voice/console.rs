//! Adapters for machines without audio hardware

use async_trait::async_trait;

use super::{SpeechCapture, SpeechPlayback};
use crate::{Error, Result};

/// Capture adapter that always fails with a fixed reason
#[derive(Debug, Clone)]
pub struct UnavailableCapture {
    reason: String,
}

impl UnavailableCapture {
    /// Fail every capture with `reason`
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableCapture {
    fn default() -> Self {
        Self::new("voice input not available in this build")
    }
}

#[async_trait]
impl SpeechCapture for UnavailableCapture {
    async fn capture(&self) -> Result<String> {
        Err(Error::SpeechCapture(self.reason.clone()))
    }
}

/// Playback adapter that writes the utterance to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSpeaker;

#[async_trait]
impl SpeechPlayback for ConsoleSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        println!("🔊 {text}");
        Ok(())
    }

    fn cancel(&self) {}
}
