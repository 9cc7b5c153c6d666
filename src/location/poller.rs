//! Periodic location polling with proximity evaluation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{LocationFailure, LocationProvider};
use crate::Error;
use crate::error::ErrorKind;
use crate::geo::{Coordinate, PoiRegistry, ProximityState};
use crate::notice::Notices;

/// Default time between scheduled fetches (5 minutes)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Latest known position and the last fetch error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationState {
    /// Last successful fix
    pub coordinate: Option<Coordinate>,
    /// Failure of the most recent applied fetch, cleared by the next success
    pub last_error: Option<LocationFailure>,
}

/// Everything the poller publishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationSnapshot {
    /// Position state
    pub location: LocationState,
    /// Proximity derived from `location.coordinate`
    pub proximity: ProximityState,
}

/// Drives the location provider on a timer and publishes the results
///
/// The timer is owned by this value: created by [`start`](Self::start),
/// cancelled by [`stop`](Self::stop) or when the poller is dropped.
pub struct LocationPoller {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    provider: LocationProvider,
    registry: Arc<PoiRegistry>,
    interval: Duration,
    notices: Notices,
    state: watch::Sender<LocationSnapshot>,
    /// Sequence handed to the most recently started fetch
    started: AtomicU64,
    /// Sequence of the most recently applied fetch
    applied: Mutex<u64>,
}

impl LocationPoller {
    /// Create a stopped poller
    #[must_use]
    pub fn new(
        provider: LocationProvider,
        registry: Arc<PoiRegistry>,
        interval: Duration,
        notices: Notices,
    ) -> Self {
        let (state, _) = watch::channel(LocationSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                provider,
                registry,
                // tokio intervals reject a zero period
                interval: interval.max(Duration::from_millis(1)),
                notices,
                state,
                started: AtomicU64::new(0),
                applied: Mutex::new(0),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Fetch immediately, then every interval
    ///
    /// Calling this while already running does nothing. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("location polling already running");
            return;
        }

        let shared = Arc::clone(&self.shared);
        tracing::info!(
            interval_secs = shared.interval.as_secs(),
            "starting location polling"
        );

        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(shared.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                // Failures are recorded in state; the loop keeps going
                let _ = shared.fetch_and_apply().await;
            }
        }));
    }

    /// Cancel the timer; no tick fires afterwards
    ///
    /// Safe to call when not started.
    pub fn stop(&self) {
        let handle = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("location polling stopped");
        }
    }

    /// Whether the timer is active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one fetch outside the schedule
    ///
    /// Has the same effect as a scheduled tick and leaves the timer alone.
    /// Returns the proximity of this fetch's own fix, even if a newer fetch
    /// finished first and this result was not published.
    ///
    /// # Errors
    ///
    /// Returns the location failure, which is also recorded in state
    pub async fn refresh_now(&self) -> std::result::Result<ProximityState, LocationFailure> {
        self.shared.fetch_and_apply().await
    }

    /// Current published state
    #[must_use]
    pub fn snapshot(&self) -> LocationSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Current position state
    #[must_use]
    pub fn location(&self) -> LocationState {
        self.shared.state.borrow().location.clone()
    }

    /// Current proximity
    #[must_use]
    pub fn proximity(&self) -> ProximityState {
        self.shared.state.borrow().proximity.clone()
    }

    /// Watch published state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LocationSnapshot> {
        self.shared.state.subscribe()
    }

    /// POI registry used for proximity
    #[must_use]
    pub fn registry(&self) -> &PoiRegistry {
        &self.shared.registry
    }

    /// Time between scheduled fetches
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }
}

impl Drop for LocationPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LocationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationPoller")
            .field("interval", &self.shared.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Shared {
    async fn fetch_and_apply(&self) -> std::result::Result<ProximityState, LocationFailure> {
        let seq = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self
            .provider
            .fetch()
            .await
            .map(|coordinate| (coordinate, ProximityState::evaluate(&coordinate, &self.registry)));

        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        if seq < *applied {
            tracing::debug!(seq, applied = *applied, "discarding stale location result");
            return result.map(|(_, proximity)| proximity);
        }
        *applied = seq;

        match result {
            Ok((coordinate, proximity)) => {
                self.state.send_modify(|snapshot| {
                    if snapshot.proximity != proximity {
                        tracing::info!(
                            nearby = proximity.nearby().unwrap_or("none"),
                            "proximity changed"
                        );
                    }
                    snapshot.location.coordinate = Some(coordinate);
                    snapshot.location.last_error = None;
                    snapshot.proximity = proximity.clone();
                });
                Ok(proximity)
            }
            Err(failure) => {
                self.state
                    .send_modify(|snapshot| snapshot.location.last_error = Some(failure.clone()));
                self.notices.post(
                    ErrorKind::LocationUnavailable,
                    Error::from(failure.clone()).to_string(),
                );
                Err(failure)
            }
        }
    }
}
