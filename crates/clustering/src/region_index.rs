use std::collections::BTreeMap;
use std::sync::OnceLock;

use formats::{PolygonRings, RegionCollection};
use foundation::{GeoBounds, LatLng, open_ring, point_in_polygon, ring_centroid};
use tracing::debug;

use crate::error::ClusterError;

/// A named polygon (or multipolygon) boundary.
#[derive(Debug)]
pub struct Region {
    pub name: String,
    pub polygons: Vec<PolygonRings>,
    bbox: GeoBounds,
    centroid: OnceLock<Option<LatLng>>,
}

impl Region {
    fn new(name: String, polygons: Vec<PolygonRings>) -> Result<Self, ClusterError> {
        let outer_vertices = polygons.iter().filter_map(|rings| rings.first()).flatten();
        let bbox = GeoBounds::from_points(outer_vertices)
            .ok_or_else(|| ClusterError::Data(format!("region {name} has no vertices")))?;
        if !bbox.is_finite() {
            return Err(ClusterError::Data(format!(
                "region {name} has non-finite coordinates"
            )));
        }
        Ok(Self {
            name,
            polygons,
            bbox,
            centroid: OnceLock::new(),
        })
    }

    pub fn bbox(&self) -> GeoBounds {
        self.bbox
    }

    pub fn contains(&self, p: LatLng) -> bool {
        self.bbox.contains(p) && self.polygons.iter().any(|rings| point_in_polygon(p, rings))
    }

    /// Vertex-mean of every outer ring, computed on first use and cached.
    ///
    /// A single polygon gets its outer ring's centroid; a multipolygon pools
    /// the distinct vertices of all its outer rings.
    pub fn centroid(&self) -> Option<LatLng> {
        *self.centroid.get_or_init(|| {
            let outers: Vec<&[LatLng]> = self
                .polygons
                .iter()
                .filter_map(|rings| rings.first().map(Vec::as_slice))
                .collect();
            match outers.as_slice() {
                [outer] => ring_centroid(outer),
                _ => LatLng::mean(outers.iter().copied().flat_map(open_ring)),
            }
        })
    }
}

/// Ordered set of regions answering "which region contains this point".
///
/// Regions are expected not to overlap. If they do, the region that appears
/// first in the source collection wins.
#[derive(Debug)]
pub struct RegionIndex {
    regions: Vec<Region>,
    by_name: BTreeMap<String, usize>,
}

impl RegionIndex {
    /// Builds the index. Features sharing a name are merged into one region,
    /// keeping the position of the first occurrence.
    pub fn load(collection: &RegionCollection) -> Result<Self, ClusterError> {
        if collection.is_empty() {
            return Err(ClusterError::Data("region collection is empty".to_string()));
        }

        let mut grouped: Vec<(String, Vec<PolygonRings>)> = Vec::new();
        let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
        for feature in &collection.features {
            match by_name.get(&feature.name) {
                Some(&i) => {
                    debug!(region = %feature.name, "merging repeated region feature");
                    grouped[i].1.extend(feature.polygons.iter().cloned());
                }
                None => {
                    by_name.insert(feature.name.clone(), grouped.len());
                    grouped.push((feature.name.clone(), feature.polygons.clone()));
                }
            }
        }

        let regions = grouped
            .into_iter()
            .map(|(name, polygons)| Region::new(name, polygons))
            .collect::<Result<Vec<_>, _>>()?;

        log_bbox_overlap(&regions);
        Ok(Self { regions, by_name })
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, ClusterError> {
        let collection = RegionCollection::from_geojson_str(payload)?;
        Self::load(&collection)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.index_of(name).and_then(|i| self.regions.get(i))
    }

    /// Linear first-match scan. Non-finite positions never match.
    pub fn find_region_index(&self, p: LatLng) -> Option<usize> {
        if !p.is_finite() {
            return None;
        }
        self.regions.iter().position(|r| r.contains(p))
    }

    pub fn find_region(&self, p: LatLng) -> Option<&Region> {
        self.find_region_index(p).and_then(|i| self.regions.get(i))
    }

    pub fn centroid_of(&self, name: &str) -> Option<LatLng> {
        self.get(name).and_then(Region::centroid)
    }
}

fn log_bbox_overlap(regions: &[Region]) {
    // Only a hint: bbox overlap is common for neighbors with concave edges.
    let overlapping = regions
        .iter()
        .enumerate()
        .flat_map(|(i, a)| regions[i + 1..].iter().map(move |b| (a, b)))
        .filter(|(a, b)| {
            let (a, b) = (a.bbox, b.bbox);
            a.west < b.east && b.west < a.east && a.south < b.north && b.south < a.north
        })
        .count();
    if overlapping > 0 {
        debug!(
            pairs = overlapping,
            "region bounding boxes overlap; containment resolves to the earliest region"
        );
    }
}
