//! Voice interaction state machine
//!
//! ```text
//!   Idle ──listen──▶ Listening ──transcript / failure──▶ Idle
//!     │                  │
//!     └──speak──▶ Speaking ◀──speak (replaces current utterance)
//!                    │
//!                    └──completion / stop──▶ Idle
//! ```
//!
//! Capture requests while a capture is in flight are no-ops. Capture requests
//! while speaking are refused. A new utterance cancels the previous one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{SpeechCapture, SpeechPlayback};
use crate::Error;
use crate::notice::Notices;

/// Message used when the capture adapter returns an empty transcript
pub const NO_SPEECH_DETECTED: &str = "No speech detected.";

/// Current voice activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Capturing speech
    Listening,
    /// Playing a reply aloud
    Speaking,
}

impl std::fmt::Display for VoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Speaking => write!(f, "speaking"),
        }
    }
}

/// Result of a capture request
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Non-empty, trimmed transcript
    Transcript(String),
    /// A capture was already in flight; nothing was started
    AlreadyListening,
    /// A reply is being spoken; capture was refused
    Busy,
    /// Capture failed or heard nothing; a notice was posted
    Failed(Error),
}

/// Coordinates speech capture and playback
#[derive(Clone)]
pub struct VoiceController {
    inner: Arc<Inner>,
}

struct Inner {
    capture: Arc<dyn SpeechCapture>,
    playback: Arc<dyn SpeechPlayback>,
    notices: Notices,
    state: watch::Sender<VoiceState>,
    capturing: AtomicBool,
    utterance: Mutex<Option<JoinHandle<()>>>,
    /// Identifies the utterance allowed to report completion
    serial: AtomicU64,
}

impl VoiceController {
    /// Create an idle controller
    #[must_use]
    pub fn new(
        capture: Arc<dyn SpeechCapture>,
        playback: Arc<dyn SpeechPlayback>,
        notices: Notices,
    ) -> Self {
        let (state, _) = watch::channel(VoiceState::Idle);
        Self {
            inner: Arc::new(Inner {
                capture,
                playback,
                notices,
                state,
                capturing: AtomicBool::new(false),
                utterance: Mutex::new(None),
                serial: AtomicU64::new(0),
            }),
        }
    }

    /// Capture one utterance and return its transcript
    ///
    /// The transcript is not dispatched here; the session owns that step.
    pub async fn listen(&self) -> CaptureOutcome {
        let inner = &*self.inner;

        if *inner.state.borrow() == VoiceState::Speaking {
            tracing::debug!("capture refused while speaking");
            return CaptureOutcome::Busy;
        }
        if inner.capturing.swap(true, Ordering::SeqCst) {
            tracing::debug!("capture already in progress");
            return CaptureOutcome::AlreadyListening;
        }

        let guard = CaptureGuard(inner);
        inner.state.send_replace(VoiceState::Listening);
        tracing::debug!("listening");

        let result = inner.capture.capture().await;
        drop(guard);

        match result {
            Ok(transcript) if !transcript.trim().is_empty() => {
                let transcript = transcript.trim().to_string();
                tracing::info!(transcript = %transcript, "speech captured");
                CaptureOutcome::Transcript(transcript)
            }
            Ok(_) => self.capture_failed(Error::SpeechCapture(NO_SPEECH_DETECTED.to_string())),
            Err(e @ Error::SpeechCapture(_)) => self.capture_failed(e),
            Err(e) => self.capture_failed(Error::SpeechCapture(e.to_string())),
        }
    }

    fn capture_failed(&self, error: Error) -> CaptureOutcome {
        tracing::warn!(error = %error, "speech capture failed");
        self.inner.notices.post_error(&error);
        CaptureOutcome::Failed(error)
    }

    /// Speak `text`, cancelling any utterance in progress
    ///
    /// Returns immediately; playback runs as a task. Must be called from
    /// within a Tokio runtime.
    pub fn speak(&self, text: impl Into<String>) {
        let text = text.into();
        let inner = &self.inner;
        let mut slot = inner.utterance.lock().unwrap_or_else(PoisonError::into_inner);

        // Invalidate the previous utterance's completion before stopping it
        let serial = inner.serial.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = slot.take() {
            if !previous.is_finished() {
                tracing::debug!("cancelling previous utterance");
                inner.playback.cancel();
            }
            previous.abort();
        }

        inner.state.send_replace(VoiceState::Speaking);
        tracing::debug!(chars = text.len(), "speaking");

        let task_inner = Arc::clone(inner);
        *slot = Some(tokio::spawn(async move {
            if let Err(e) = task_inner.playback.speak(&text).await {
                tracing::warn!(error = %e, "playback failed");
            }
            task_inner.finish_utterance(serial);
        }));
    }

    /// Stop the current utterance
    ///
    /// Returns `true` if something was being spoken. The cancelled
    /// utterance never reports completion.
    pub fn stop_speaking(&self) -> bool {
        let inner = &self.inner;
        inner.serial.fetch_add(1, Ordering::SeqCst);

        let handle = inner
            .utterance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            inner.playback.cancel();
            handle.abort();
        }

        let was_speaking = inner.leave_speaking();
        if was_speaking {
            tracing::info!("speech stopped");
        }
        was_speaking
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> VoiceState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.inner.state.subscribe()
    }
}

impl std::fmt::Debug for VoiceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn finish_utterance(&self, serial: u64) {
        if self.serial.load(Ordering::SeqCst) == serial {
            self.leave_speaking();
            tracing::debug!("utterance complete");
        }
    }

    /// Leave `Speaking`, falling back to `Listening` if a capture is still open
    fn leave_speaking(&self) -> bool {
        let next = if self.capturing.load(Ordering::SeqCst) {
            VoiceState::Listening
        } else {
            VoiceState::Idle
        };
        self.state.send_if_modified(|state| {
            if *state == VoiceState::Speaking {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

/// Closes a capture even if the listening future is dropped
struct CaptureGuard<'a>(&'a Inner);

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.0.capturing.store(false, Ordering::SeqCst);
        self.0.state.send_if_modified(|state| {
            if *state == VoiceState::Listening {
                *state = VoiceState::Idle;
                true
            } else {
                false
            }
        });
    }
}
