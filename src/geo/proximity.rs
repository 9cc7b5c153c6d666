//! First-match proximity detection

use super::{Coordinate, Poi, PoiRegistry};

/// Name of the POI the user is currently inside, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProximityState {
    /// Matched POI name
    pub nearby: Option<String>,
}

impl ProximityState {
    /// Evaluate `point` against `registry`
    #[must_use]
    pub fn evaluate(point: &Coordinate, registry: &PoiRegistry) -> Self {
        Self {
            nearby: find_nearby(point, registry).map(|poi| poi.name.clone()),
        }
    }

    /// Matched POI name
    #[must_use]
    pub fn nearby(&self) -> Option<&str> {
        self.nearby.as_deref()
    }
}

/// Return the first POI, in registry order, whose geofence contains `point`
///
/// Overlapping geofences resolve by registry order, not by which center is
/// closest.
#[must_use]
pub fn find_nearby<'a>(point: &Coordinate, registry: &'a PoiRegistry) -> Option<&'a Poi> {
    registry.iter().find(|poi| poi.contains(point))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(pois: Vec<Poi>) -> PoiRegistry {
        PoiRegistry::new(pois).unwrap()
    }

    #[test]
    fn first_match_wins_over_nearest() {
        // Sample sits on P2's center but inside both fences
        let reg = registry(vec![
            Poi::new("P1", 0.0, 0.0005, 100.0),
            Poi::new("P2", 0.0, 0.0, 100.0),
        ]);
        let hit = find_nearby(&Coordinate::new(0.0, 0.0), &reg).unwrap();
        assert_eq!(hit.name, "P1");
    }

    #[test]
    fn none_outside_every_radius() {
        let reg = registry(vec![
            Poi::new("P1", 10.0, 10.0, 100.0),
            Poi::new("P2", -10.0, -10.0, 5_000.0),
        ]);
        assert!(find_nearby(&Coordinate::new(0.0, 0.0), &reg).is_none());
        assert_eq!(
            ProximityState::evaluate(&Coordinate::new(0.0, 0.0), &reg),
            ProximityState::default()
        );
    }

    #[test]
    fn empty_registry_matches_nothing() {
        assert!(find_nearby(&Coordinate::new(0.0, 0.0), &PoiRegistry::default()).is_none());
    }

    #[test]
    fn evaluate_names_the_match() {
        let reg = registry(vec![Poi::new("Old Town", 50.0, 14.0, 150.0)]);
        let state = ProximityState::evaluate(&Coordinate::new(50.0005, 14.0), &reg);
        assert_eq!(state.nearby(), Some("Old Town"));
    }
}
