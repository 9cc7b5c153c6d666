//! Session orchestration: query assembly, dispatch, and reply routing
//!
//! The session ties the location poller, the voice controller and the
//! assistant backend together. It owns the input buffer, the displayed reply
//! and the user preferences; it only reads proximity and voice state through
//! their owners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::Error;
use crate::assistant::{Assistant, PendingQuery};
use crate::geo::Coordinate;
use crate::location::{LocationFailure, LocationPoller};
use crate::notice::{Notice, Notices};
use crate::voice::{CaptureOutcome, VoiceController, VoiceState};

/// User toggles read at dispatch time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPreferences {
    /// Attach the nearby POI name to outgoing queries
    pub use_location_context: bool,
    /// Speak replies aloud
    pub auto_speak: bool,
}

impl Default for SessionPreferences {
    fn default() -> Self {
        Self {
            use_location_context: true,
            auto_speak: true,
        }
    }
}

/// What happened to a dispatch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Input was blank; nothing was sent
    Blank,
    /// Reply displayed (and spoken if enabled)
    Answered(String),
    /// A later submission was rendered first; this result was dropped
    Superseded,
    /// Request failed; a notice was posted and no reply is displayed
    Failed(Error),
}

/// What happened to a voice input request
#[derive(Debug)]
pub enum VoiceInputOutcome {
    /// A transcript was captured and dispatched
    Dispatched {
        /// Captured text
        transcript: String,
        /// Result of dispatching it
        outcome: DispatchOutcome,
    },
    /// Nothing was dispatched
    NotDispatched(CaptureOutcome),
}

/// Read-only view of everything a rendering surface shows
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    /// Last known position
    pub coordinate: Option<Coordinate>,
    /// Most recent location failure
    pub location_error: Option<LocationFailure>,
    /// Matched POI name
    pub nearby_place: Option<String>,
    /// Voice activity
    pub voice: VoiceState,
    /// Visible input buffer
    pub input: String,
    /// Displayed reply
    pub reply: Option<String>,
    /// Transient notice
    pub notice: Option<Notice>,
    /// Current toggles
    pub preferences: SessionPreferences,
}

/// A running conversational session
pub struct Session {
    poller: Arc<LocationPoller>,
    voice: VoiceController,
    assistant: Arc<dyn Assistant>,
    notices: Notices,
    preferences: watch::Sender<SessionPreferences>,
    input: watch::Sender<String>,
    reply: watch::Sender<Option<String>>,
    /// Sequence handed to the most recent submission
    submitted: AtomicU64,
    /// Sequence of the submission currently rendered
    rendered: Mutex<u64>,
}

impl Session {
    /// Assemble a session from its collaborators
    #[must_use]
    pub fn new(
        poller: Arc<LocationPoller>,
        voice: VoiceController,
        assistant: Arc<dyn Assistant>,
        notices: Notices,
        preferences: SessionPreferences,
    ) -> Self {
        Self {
            poller,
            voice,
            assistant,
            notices,
            preferences: watch::channel(preferences).0,
            input: watch::channel(String::new()).0,
            reply: watch::channel(None).0,
            submitted: AtomicU64::new(0),
            rendered: Mutex::new(0),
        }
    }

    /// Start location polling
    pub fn start(&self) {
        self.poller.start();
    }

    /// Stop location polling and any speech
    pub fn shutdown(&self) {
        self.poller.stop();
        self.voice.stop_speaking();
    }

    /// Send `text` to the assistant
    ///
    /// Blank input is ignored without touching the network. Otherwise the
    /// input buffer is cleared before the request goes out, and proximity is
    /// read now rather than when it was computed.
    pub async fn dispatch(&self, text: &str) -> DispatchOutcome {
        let prompt = text.trim();
        if prompt.is_empty() {
            tracing::debug!("ignoring blank input");
            return DispatchOutcome::Blank;
        }

        self.input.send_replace(String::new());

        let seq = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        let preferences = *self.preferences.borrow();
        let nearby_place = if preferences.use_location_context {
            self.poller.proximity().nearby
        } else {
            None
        };
        let query = PendingQuery {
            prompt: prompt.to_string(),
            nearby_place,
        };

        tracing::info!(seq, nearby_place = ?query.nearby_place, "dispatching query");
        let result = self.assistant.ask(&query).await;

        let mut rendered = self.rendered.lock().unwrap_or_else(PoisonError::into_inner);
        if seq < *rendered {
            tracing::debug!(seq, rendered = *rendered, "dropping result of older submission");
            return DispatchOutcome::Superseded;
        }
        *rendered = seq;

        match result {
            Ok(reply) => {
                self.reply.send_replace(Some(reply.clone()));
                if preferences.auto_speak && !reply.trim().is_empty() {
                    self.voice.speak(reply.clone());
                }
                DispatchOutcome::Answered(reply)
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "dispatch failed");
                self.reply.send_replace(None);
                self.notices.post_error(&e);
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// Dispatch whatever is in the input buffer
    pub async fn submit(&self) -> DispatchOutcome {
        let text = self.input.borrow().clone();
        self.dispatch(&text).await
    }

    /// Capture speech and dispatch the transcript directly
    ///
    /// The transcript bypasses the input buffer.
    pub async fn start_voice_input(&self) -> VoiceInputOutcome {
        match self.voice.listen().await {
            CaptureOutcome::Transcript(transcript) => {
                let outcome = self.dispatch(&transcript).await;
                VoiceInputOutcome::Dispatched {
                    transcript,
                    outcome,
                }
            }
            other => VoiceInputOutcome::NotDispatched(other),
        }
    }

    /// Stop speaking the current reply
    pub fn stop_speaking(&self) -> bool {
        self.voice.stop_speaking()
    }

    /// Fetch location now, outside the polling schedule
    ///
    /// # Errors
    ///
    /// Returns the location failure, which has also been posted as a notice
    pub async fn refresh_location(&self) -> std::result::Result<Option<String>, LocationFailure> {
        self.poller.refresh_now().await.map(|p| p.nearby)
    }

    /// Replace the visible input buffer
    pub fn set_input(&self, text: impl Into<String>) {
        self.input.send_replace(text.into());
    }

    /// Visible input buffer
    #[must_use]
    pub fn input(&self) -> String {
        self.input.borrow().clone()
    }

    /// Toggle location context on outgoing queries
    pub fn set_use_location_context(&self, enabled: bool) {
        self.preferences
            .send_modify(|p| p.use_location_context = enabled);
        tracing::info!(enabled, "location context toggled");
    }

    /// Toggle spoken replies
    pub fn set_auto_speak(&self, enabled: bool) {
        self.preferences.send_modify(|p| p.auto_speak = enabled);
        tracing::info!(enabled, "auto-speak toggled");
    }

    /// Current toggles
    #[must_use]
    pub fn preferences(&self) -> SessionPreferences {
        *self.preferences.borrow()
    }

    /// Displayed reply
    #[must_use]
    pub fn reply(&self) -> Option<String> {
        self.reply.borrow().clone()
    }

    /// Watch the displayed reply
    #[must_use]
    pub fn subscribe_reply(&self) -> watch::Receiver<Option<String>> {
        self.reply.subscribe()
    }

    /// Watch the input buffer
    #[must_use]
    pub fn subscribe_input(&self) -> watch::Receiver<String> {
        self.input.subscribe()
    }

    /// Snapshot for rendering
    #[must_use]
    pub fn view(&self) -> SessionView {
        let snapshot = self.poller.snapshot();
        SessionView {
            coordinate: snapshot.location.coordinate,
            location_error: snapshot.location.last_error,
            nearby_place: snapshot.proximity.nearby,
            voice: self.voice.state(),
            input: self.input(),
            reply: self.reply(),
            notice: self.notices.current(),
            preferences: self.preferences(),
        }
    }

    /// Location poller
    #[must_use]
    pub fn poller(&self) -> &LocationPoller {
        &self.poller
    }

    /// Voice controller
    #[must_use]
    pub const fn voice(&self) -> &VoiceController {
        &self.voice
    }

    /// Notice board
    #[must_use]
    pub const fn notices(&self) -> &Notices {
        &self.notices
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("preferences", &self.preferences())
            .field("voice", &self.voice.state())
            .finish_non_exhaustive()
    }
}
