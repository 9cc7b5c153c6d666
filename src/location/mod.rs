//! Location acquisition and polling
//!
//! A [`LocationSource`] yields a single position fix. [`LocationProvider`]
//! puts a deadline on it and normalizes every failure into a
//! [`LocationFailure`]. [`LocationPoller`] drives the provider on a timer and
//! publishes the latest location and proximity.

mod poller;
mod sources;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::geo::Coordinate;

pub use poller::{DEFAULT_POLL_INTERVAL, LocationPoller, LocationSnapshot, LocationState};
pub use sources::{FixedLocationSource, GeoIpLocationSource, UnsupportedLocationSource};

/// Default deadline for a single position fix
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a position fix could not be obtained
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationFailure {
    /// No location capability present
    #[error("Geolocation not supported")]
    Unsupported,

    /// The user or platform refused access
    #[error("permission denied")]
    PermissionDenied,

    /// No fix within the deadline
    #[error("timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The source reported an error
    #[error("{0}")]
    Position(String),
}

/// External capability producing a single position fix
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Request one fix
    ///
    /// `timeout` is advisory for the source; the provider enforces it anyway.
    async fn request(
        &self,
        timeout: Duration,
        high_accuracy: bool,
    ) -> std::result::Result<Coordinate, LocationFailure>;
}

/// Wraps a [`LocationSource`] with a deadline and failure normalization
#[derive(Clone)]
pub struct LocationProvider {
    source: Arc<dyn LocationSource>,
    timeout: Duration,
}

impl std::fmt::Debug for LocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationProvider")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LocationProvider {
    /// Create a provider with the given default deadline
    #[must_use]
    pub fn new(source: Arc<dyn LocationSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Default deadline
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch a fix using the default deadline
    ///
    /// # Errors
    ///
    /// Returns the normalized failure if no valid fix arrives in time
    pub async fn fetch(&self) -> std::result::Result<Coordinate, LocationFailure> {
        self.fetch_location(self.timeout).await
    }

    /// Fetch a fix, giving up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns the normalized failure if no valid fix arrives in time
    pub async fn fetch_location(
        &self,
        timeout: Duration,
    ) -> std::result::Result<Coordinate, LocationFailure> {
        let result = match tokio::time::timeout(timeout, self.source.request(timeout, true)).await {
            Ok(Ok(coordinate)) if is_valid(&coordinate) => Ok(coordinate),
            Ok(Ok(coordinate)) => Err(LocationFailure::Position(format!(
                "invalid position {coordinate}"
            ))),
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(LocationFailure::Timeout(timeout)),
        };

        match &result {
            Ok(coordinate) => tracing::debug!(%coordinate, "location fix"),
            Err(failure) => tracing::warn!(error = %failure, "location fetch failed"),
        }

        result
    }
}

fn is_valid(c: &Coordinate) -> bool {
    c.latitude.is_finite()
        && c.longitude.is_finite()
        && (-90.0..=90.0).contains(&c.latitude)
        && (-180.0..=180.0).contains(&c.longitude)
}
