//! Microphone capture transcribed through STT

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::{SpeechCapture, SpeechToText};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Record `window` of mono audio from the default input device
///
/// Blocks the calling thread; cpal streams are not `Send`.
fn record_blocking(window: Duration) -> Result<Vec<f32>> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let config: StreamConfig = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|range| {
            range.channels() == 1
                && (range.min_sample_rate()..=range.max_sample_rate())
                    .contains(&SampleRate(SAMPLE_RATE))
        })
        .ok_or_else(|| Error::Audio("microphone cannot record 16 kHz mono".to_string()))?
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        window_ms = window.as_millis(),
        "recording"
    );

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(data);
            },
            |err| tracing::error!(error = %err, "microphone stream error"),
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    std::thread::sleep(window);
    drop(stream);

    let samples = std::mem::take(&mut *recorded.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(samples)
}

/// Records a fixed window from the microphone and transcribes it
pub struct MicrophoneCapture {
    stt: SpeechToText,
    window: Duration,
}

impl MicrophoneCapture {
    /// Record for `window` per capture request
    #[must_use]
    pub const fn new(stt: SpeechToText, window: Duration) -> Self {
        Self { stt, window }
    }
}

#[async_trait]
impl SpeechCapture for MicrophoneCapture {
    async fn capture(&self) -> Result<String> {
        let window = self.window;

        let samples = tokio::task::spawn_blocking(move || record_blocking(window))
            .await
            .map_err(|e| Error::Audio(format!("capture thread failed: {e}")))??;

        tracing::debug!(samples = samples.len(), "captured audio");
        if samples.is_empty() {
            return Ok(String::new());
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        self.stt.transcribe(&wav).await
    }
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
