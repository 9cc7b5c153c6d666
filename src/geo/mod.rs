//! Geodesy and geofences
//!
//! Pure functions only: distance math, the POI registry, and first-match
//! proximity detection.

mod coordinate;
mod proximity;
mod registry;

pub use coordinate::{Coordinate, EARTH_RADIUS_M, haversine_distance};
pub use proximity::{ProximityState, find_nearby};
pub use registry::{Poi, PoiRegistry};
