//! Ordered registry of points of interest
//!
//! The registry is loaded once at startup, either from a JSON file or from the
//! default set compiled into the binary. Order is significant: proximity
//! detection returns the first matching entry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Coordinate;
use crate::{Error, Result};

/// Registry compiled into the binary, used when no file is configured
const EMBEDDED_POIS: &str = include_str!("../../pois/default.json");

/// A named circular geofence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    /// Display name, sent to the backend as proximity context
    pub name: String,
    /// Center latitude in degrees
    pub lat: f64,
    /// Center longitude in degrees
    pub lon: f64,
    /// Geofence radius in meters
    #[serde(rename = "radius")]
    pub radius_m: f64,
}

impl Poi {
    /// Create a POI
    #[must_use]
    pub fn new(name: impl Into<String>, lat: f64, lon: f64, radius_m: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
            radius_m,
        }
    }

    /// Center of the geofence
    #[must_use]
    pub const fn center(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// Whether `point` lies within this geofence (boundary inclusive)
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.center().distance_to(point) <= self.radius_m
    }
}

/// Immutable, ordered collection of POIs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiRegistry {
    pois: Vec<Poi>,
}

impl PoiRegistry {
    /// Build a registry from POIs in priority order
    ///
    /// # Errors
    ///
    /// Returns error if a POI has an empty name, non-finite coordinates, or a
    /// negative radius
    pub fn new(pois: Vec<Poi>) -> Result<Self> {
        for (index, poi) in pois.iter().enumerate() {
            validate(index, poi)?;
        }
        Ok(Self { pois })
    }

    /// Parse a registry from a JSON array of `{name, lat, lon, radius}`
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or an entry is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let pois: Vec<Poi> = serde_json::from_str(json)?;
        Self::new(pois)
    }

    /// Load a registry from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&content).map_err(|e| {
            Error::Config(format!("failed to parse POI file {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), count = registry.len(), "loaded POI registry");
        Ok(registry)
    }

    /// The registry compiled into the binary
    ///
    /// # Errors
    ///
    /// Returns error if the embedded data is invalid
    pub fn embedded() -> Result<Self> {
        let registry = Self::from_json(EMBEDDED_POIS)?;
        tracing::debug!(count = registry.len(), "loaded embedded POI registry");
        Ok(registry)
    }

    /// Load from `path` when given, otherwise fall back to the embedded set
    ///
    /// # Errors
    ///
    /// Returns error if the configured file cannot be loaded
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(Self::embedded, Self::load)
    }

    /// POIs in priority order
    #[must_use]
    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }

    /// Iterate in priority order
    pub fn iter(&self) -> std::slice::Iter<'_, Poi> {
        self.pois.iter()
    }

    /// Number of POIs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pois.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }
}

impl<'a> IntoIterator for &'a PoiRegistry {
    type Item = &'a Poi;
    type IntoIter = std::slice::Iter<'a, Poi>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn validate(index: usize, poi: &Poi) -> Result<()> {
    if poi.name.trim().is_empty() {
        return Err(Error::Config(format!("POI #{index} has an empty name")));
    }
    if !poi.lat.is_finite() || !poi.lon.is_finite() {
        return Err(Error::Config(format!(
            "POI '{}' has non-finite coordinates",
            poi.name
        )));
    }
    if !poi.radius_m.is_finite() || poi.radius_m < 0.0 {
        return Err(Error::Config(format!(
            "POI '{}' has invalid radius {}",
            poi.name, poi.radius_m
        )));
    }
    Ok(())
}
