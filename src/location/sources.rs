//! Concrete location sources

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{LocationFailure, LocationSource};
use crate::geo::Coordinate;

/// Always reports the same coordinate
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationSource {
    coordinate: Coordinate,
}

impl FixedLocationSource {
    /// Report `coordinate` on every request
    #[must_use]
    pub const fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn request(
        &self,
        _timeout: Duration,
        _high_accuracy: bool,
    ) -> Result<Coordinate, LocationFailure> {
        Ok(self.coordinate)
    }
}

/// Used when no location capability is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedLocationSource;

#[async_trait]
impl LocationSource for UnsupportedLocationSource {
    async fn request(
        &self,
        _timeout: Duration,
        _high_accuracy: bool,
    ) -> Result<Coordinate, LocationFailure> {
        Err(LocationFailure::Unsupported)
    }
}

/// Resolves position through an HTTP geo-IP lookup
///
/// The endpoint must return a JSON object with `lat`/`lon` or
/// `latitude`/`longitude` numbers. Accuracy is city-level at best, so the
/// `high_accuracy` hint is ignored.
#[derive(Debug, Clone)]
pub struct GeoIpLocationSource {
    client: reqwest::Client,
    url: String,
}

impl GeoIpLocationSource {
    /// Create a lookup against `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LocationSource for GeoIpLocationSource {
    async fn request(
        &self,
        timeout: Duration,
        _high_accuracy: bool,
    ) -> Result<Coordinate, LocationFailure> {
        tracing::debug!(url = %self.url, "requesting geo-IP position");

        let response = self
            .client
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationFailure::Timeout(timeout)
                } else {
                    LocationFailure::Position(format!("geo-IP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LocationFailure::PermissionDenied);
        }
        if !status.is_success() {
            return Err(LocationFailure::Position(format!(
                "geo-IP lookup returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LocationFailure::Position(format!("invalid geo-IP response: {e}")))?;

        parse_position(&body)
            .ok_or_else(|| LocationFailure::Position("geo-IP response has no position".to_string()))
    }
}

/// Extract a coordinate from a geo-IP JSON body
fn parse_position(body: &Value) -> Option<Coordinate> {
    let field = |short: &str, long: &str| {
        body.get(short)
            .or_else(|| body.get(long))
            .and_then(number)
    };
    Some(Coordinate::new(
        field("lat", "latitude")?,
        field("lon", "longitude")?,
    ))
}

/// Some services send coordinates as strings
fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_field_names() {
        let body = serde_json::json!({"status": "success", "lat": 50.08, "lon": 14.42});
        assert_eq!(parse_position(&body), Some(Coordinate::new(50.08, 14.42)));
    }

    #[test]
    fn parses_long_string_fields() {
        let body = serde_json::json!({"latitude": "-33.85", "longitude": "151.21"});
        assert_eq!(parse_position(&body), Some(Coordinate::new(-33.85, 151.21)));
    }

    #[test]
    fn missing_longitude_is_none() {
        let body = serde_json::json!({"lat": 1.0});
        assert_eq!(parse_position(&body), None);
    }
}
