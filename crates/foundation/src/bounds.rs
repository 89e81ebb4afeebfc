#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo::LatLng;

/// Axis-aligned lat/lng bounding box.
///
/// Boxes crossing the antimeridian are not represented; `west <= east` is assumed.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        GeoBounds {
            south,
            west,
            north,
            east,
        }
    }

    /// Smallest box covering every position, or `None` for an empty input.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = GeoBounds::new(first.lat, first.lng, first.lat, first.lng);
        for p in iter {
            b.south = b.south.min(p.lat);
            b.north = b.north.max(p.lat);
            b.west = b.west.min(p.lng);
            b.east = b.east.max(p.lng);
        }
        Some(b)
    }

    pub fn is_finite(&self) -> bool {
        self.south.is_finite()
            && self.west.is_finite()
            && self.north.is_finite()
            && self.east.is_finite()
    }

    /// Inclusive containment. Any NaN coordinate yields `false`.
    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lng_span(&self) -> f64 {
        self.east - self.west
    }

    /// Grows each side by `fraction` of the corresponding span.
    pub fn expanded_by_fraction(&self, fraction: f64) -> Self {
        let dlat = self.lat_span() * fraction;
        let dlng = self.lng_span() * fraction;
        GeoBounds::new(
            (self.south - dlat).max(-90.0),
            self.west - dlng,
            (self.north + dlat).min(90.0),
            self.east + dlng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::GeoBounds;
    use crate::geo::LatLng;

    #[test]
    fn contains_is_inclusive() {
        let b = GeoBounds::new(0.0, 0.0, 1.0, 1.0);
        assert!(b.contains(LatLng::new(0.0, 0.0)));
        assert!(b.contains(LatLng::new(1.0, 1.0)));
        assert!(!b.contains(LatLng::new(1.0001, 0.5)));
        assert!(!b.contains(LatLng::new(f64::NAN, 0.5)));
    }

    #[test]
    fn expansion_grows_every_side() {
        let b = GeoBounds::new(10.0, 20.0, 12.0, 24.0).expanded_by_fraction(0.5);
        assert_eq!(b, GeoBounds::new(9.0, 18.0, 13.0, 26.0));
    }

    #[test]
    fn expansion_clamps_latitude() {
        let b = GeoBounds::new(80.0, 0.0, 89.0, 1.0).expanded_by_fraction(1.0);
        assert_eq!(b.north, 90.0);
    }

    #[test]
    fn from_points_covers_all() {
        let pts = [
            LatLng::new(1.0, 5.0),
            LatLng::new(-2.0, 7.0),
            LatLng::new(0.5, 4.0),
        ];
        let b = GeoBounds::from_points(&pts).unwrap();
        assert_eq!(b, GeoBounds::new(-2.0, 4.0, 1.0, 7.0));
        assert!(GeoBounds::from_points(&[]).is_none());
    }
}
