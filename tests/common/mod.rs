//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use geo_assistant::location::LocationSource;
use geo_assistant::voice::{SpeechCapture, SpeechPlayback};
use geo_assistant::{
    Assistant, Coordinate, Error, LocationFailure, LocationPoller, LocationProvider, Notices,
    PendingQuery, PoiRegistry, Result, Session, SessionPreferences, VoiceController,
};

/// Center of Old Town Square in the embedded registry
pub const OLD_TOWN: Coordinate = Coordinate::new(50.087_465, 14.421_254);

/// Somewhere with no POI nearby (Brno)
pub const ELSEWHERE: Coordinate = Coordinate::new(49.195_060, 16.606_837);

type Step<T> = (Duration, T);

/// Location source answering from a script, then a fallback
pub struct ScriptedLocation {
    steps: Mutex<VecDeque<Step<std::result::Result<Coordinate, LocationFailure>>>>,
    fallback: std::result::Result<Coordinate, LocationFailure>,
    calls: AtomicUsize,
}

impl ScriptedLocation {
    /// Answer every request with `result`
    pub fn always(result: std::result::Result<Coordinate, LocationFailure>) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: result,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue one answer delivered after `delay`
    #[must_use]
    pub fn then(
        self,
        delay: Duration,
        result: std::result::Result<Coordinate, LocationFailure>,
    ) -> Self {
        self.steps.lock().unwrap().push_back((delay, result));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationSource for ScriptedLocation {
    async fn request(
        &self,
        _timeout: Duration,
        _high_accuracy: bool,
    ) -> std::result::Result<Coordinate, LocationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let (delay, result) = step.unwrap_or((Duration::ZERO, self.fallback.clone()));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// Scripted backend answer
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Status(u16, String),
}

/// Assistant recording every query it receives
pub struct MockAssistant {
    steps: Mutex<VecDeque<Step<Reply>>>,
    fallback: Reply,
    queries: Mutex<Vec<PendingQuery>>,
}

impl MockAssistant {
    pub fn replying(text: &str) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Reply::Text(text.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn then(self, delay: Duration, reply: Reply) -> Self {
        self.steps.lock().unwrap().push_back((delay, reply));
        self
    }

    pub fn queries(&self) -> Vec<PendingQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl Assistant for MockAssistant {
    async fn ask(&self, query: &PendingQuery) -> Result<String> {
        self.queries.lock().unwrap().push(query.clone());
        let step = self.steps.lock().unwrap().pop_front();
        let (delay, reply) = step.unwrap_or((Duration::ZERO, self.fallback.clone()));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Status(status, body) => Err(Error::Backend { status, body }),
        }
    }
}

/// Scripted capture result
#[derive(Debug, Clone)]
pub enum Heard {
    Text(String),
    Fail(String),
}

/// Capture adapter answering from a script, then a fallback
pub struct MockCapture {
    steps: Mutex<VecDeque<Step<Heard>>>,
    fallback: Heard,
    calls: AtomicUsize,
}

impl MockCapture {
    pub fn hearing(text: &str) -> Self {
        Self::with(Duration::ZERO, Heard::Text(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Duration::ZERO, Heard::Fail(message.to_string()))
    }

    pub fn with(delay: Duration, heard: Heard) -> Self {
        Self {
            steps: Mutex::new(VecDeque::from([(delay, heard.clone())])),
            fallback: heard,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechCapture for MockCapture {
    async fn capture(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let (delay, heard) = step.unwrap_or((Duration::ZERO, self.fallback.clone()));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match heard {
            Heard::Text(text) => Ok(text),
            Heard::Fail(message) => Err(Error::Audio(message)),
        }
    }
}

/// Playback adapter recording utterances; each lasts `duration`
pub struct MockPlayback {
    duration: Duration,
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl MockPlayback {
    pub fn lasting(duration: Duration) -> Self {
        Self {
            duration,
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechPlayback for MockPlayback {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Embedded Prague registry
pub fn prague() -> Arc<PoiRegistry> {
    Arc::new(PoiRegistry::embedded().expect("embedded registry"))
}

/// Poller over `source` with the embedded registry
pub fn poller(
    source: Arc<ScriptedLocation>,
    interval: Duration,
    notices: &Notices,
) -> Arc<LocationPoller> {
    let provider = LocationProvider::new(source, Duration::from_secs(10));
    Arc::new(LocationPoller::new(
        provider,
        prague(),
        interval,
        notices.clone(),
    ))
}

/// Let spawned tasks run without moving far in paused time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// A session wired to mocks
pub struct Harness {
    pub session: Arc<Session>,
    pub location: Arc<ScriptedLocation>,
    pub assistant: Arc<MockAssistant>,
    pub capture: Arc<MockCapture>,
    pub playback: Arc<MockPlayback>,
}

impl Harness {
    pub fn new(
        location: ScriptedLocation,
        assistant: MockAssistant,
        capture: MockCapture,
        preferences: SessionPreferences,
    ) -> Self {
        let notices = Notices::default();
        let location = Arc::new(location);
        let assistant = Arc::new(assistant);
        let capture = Arc::new(capture);
        let playback = Arc::new(MockPlayback::lasting(Duration::from_secs(2)));

        let voice = VoiceController::new(
            Arc::clone(&capture) as Arc<dyn SpeechCapture>,
            Arc::clone(&playback) as Arc<dyn SpeechPlayback>,
            notices.clone(),
        );
        let session = Session::new(
            poller(Arc::clone(&location), Duration::from_secs(300), &notices),
            voice,
            Arc::clone(&assistant) as Arc<dyn Assistant>,
            notices,
            preferences,
        );

        Self {
            session: Arc::new(session),
            location,
            assistant,
            capture,
            playback,
        }
    }

    /// Session at Old Town Square answering `reply`
    pub fn at_old_town(reply: &str) -> Self {
        Self::new(
            ScriptedLocation::always(Ok(OLD_TOWN)),
            MockAssistant::replying(reply),
            MockCapture::hearing("What is this place?"),
            SessionPreferences::default(),
        )
    }
}
