use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use formats::PointRecord;
use foundation::{LatLng, PointId};
use serde::Serialize;
use tracing::warn;

/// A geolocated event. Immutable once ingested; clusters share it via `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub id: PointId,
    pub position: LatLng,
    pub category: Option<String>,
    pub popularity: f64,
    pub attributes: BTreeMap<String, f64>,
}

impl Point {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: PointId::new(id),
            position: LatLng::new(lat, lng),
            category: None,
            popularity: 0.0,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Popularity plus the weighted sum of tunable attributes.
    ///
    /// Non-finite contributions are ignored so a bad attribute cannot poison
    /// a whole heat cluster.
    pub fn heat_weight(&self, attribute_weights: &BTreeMap<String, f64>) -> f64 {
        let base = if self.popularity.is_finite() {
            self.popularity
        } else {
            0.0
        };
        attribute_weights
            .iter()
            .filter_map(|(key, w)| self.attributes.get(key).map(|v| w * v))
            .filter(|c| c.is_finite())
            .fold(base, |acc, c| acc + c)
    }
}

impl From<PointRecord> for Point {
    fn from(record: PointRecord) -> Self {
        Self {
            id: PointId::new(record.id.to_string()),
            position: LatLng::new(record.lat, record.lng),
            category: record.category,
            popularity: record.popularity,
            attributes: record.attributes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected_non_finite: usize,
    pub rejected_duplicate_id: usize,
}

/// Filters a raw point set down to what the engine may cluster.
///
/// Non-finite coordinates and repeated ids are dropped (first occurrence wins)
/// and logged; nothing rejected here ever reaches the geometry kernel.
pub fn ingest_points(points: impl IntoIterator<Item = Point>) -> (Vec<Arc<Point>>, IngestReport) {
    let mut report = IngestReport::default();
    let mut seen: HashSet<PointId> = HashSet::new();
    let mut out = Vec::new();

    for point in points {
        if !point.position.is_finite() {
            warn!(
                point_id = %point.id,
                lat = point.position.lat,
                lng = point.position.lng,
                "dropping point with non-finite coordinates"
            );
            report.rejected_non_finite += 1;
            continue;
        }
        if !seen.insert(point.id.clone()) {
            warn!(point_id = %point.id, "dropping point with duplicate id");
            report.rejected_duplicate_id += 1;
            continue;
        }
        out.push(Arc::new(point));
    }

    report.accepted = out.len();
    (out, report)
}
