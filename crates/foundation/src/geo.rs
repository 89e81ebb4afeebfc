#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Geographic position in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a position from a `[longitude, latitude]` pair, the GeoJSON axis order.
    pub fn from_lng_lat(lng: f64, lat: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Arithmetic mean of `positions`, accumulated in iteration order.
    pub fn mean<'a>(positions: impl IntoIterator<Item = &'a LatLng>) -> Option<LatLng> {
        let mut sum_lat = 0.0;
        let mut sum_lng = 0.0;
        let mut n = 0usize;
        for p in positions {
            sum_lat += p.lat;
            sum_lng += p.lng;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        let n = n as f64;
        Some(LatLng::new(sum_lat / n, sum_lng / n))
    }
}
