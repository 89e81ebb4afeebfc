use std::sync::Arc;

use formats::{PointRecord, RegionCollection, parse_point_list};
use foundation::math::{
    canonical_f64, ground_resolution_m_per_px, haversine_km, stable_total_cmp_f64,
};
use foundation::{GeoBounds, LatLng};
use runtime::Metrics;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster::{Cluster, validate_partition};
use crate::config::ClusterConfig;
use crate::decluster::DeclusterSet;
use crate::error::ClusterError;
use crate::heat::cluster_heat;
use crate::overlap::OverlapLayout;
use crate::point::{IngestReport, Point, ingest_points};
use crate::region::cluster_regions;
use crate::region_index::RegionIndex;
use crate::stable::StableCenterCache;
use crate::tier::ClusterTier;
use crate::viewport::{Viewport, select_candidate_indices};

/// Summary of one recompute, attached to change notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeStats {
    pub generation: u64,
    pub tier: ClusterTier,
    pub zoom: f64,
    pub candidates: usize,
    pub clusters: usize,
    /// Candidates that matched no region (region tier only).
    pub unmatched: usize,
    /// Regions rendered per point in this recompute.
    pub declustered: usize,
}

/// Result of [`ClusterEngine::compute`], not yet visible through `clusters()`.
#[derive(Debug)]
pub struct Computation {
    pub clusters: Vec<Cluster>,
    pub tier: ClusterTier,
    pub stats: RecomputeStats,
    declustered: DeclusterSet,
    /// Regions that left the decluster set during this computation.
    pub reclustered: Vec<String>,
}

/// Clustering state for one map session.
///
/// Owns the point set, the region index, the decluster overrides and the
/// stable-center cache. Nothing here is global; every map gets its own engine.
#[derive(Debug)]
pub struct ClusterEngine {
    config: ClusterConfig,
    points: Vec<Arc<Point>>,
    dataset_digest: Option<blake3::Hash>,
    regions: Option<RegionIndex>,
    /// Region index of `points[i]`, recomputed whenever points or regions change.
    assignments: Vec<Option<usize>>,
    declustered: DeclusterSet,
    cache: StableCenterCache,
    clusters: Vec<Cluster>,
    tier: Option<ClusterTier>,
    last_stats: Option<RecomputeStats>,
    generation: u64,
    metrics: Metrics,
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl ClusterEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
            dataset_digest: None,
            regions: None,
            assignments: Vec::new(),
            declustered: DeclusterSet::new(),
            cache: StableCenterCache::new(),
            clusters: Vec::new(),
            tier: None,
            last_stats: None,
            generation: 0,
            metrics: Metrics::new(),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn points(&self) -> &[Arc<Point>] {
        &self.points
    }

    pub fn regions(&self) -> Option<&RegionIndex> {
        self.regions.as_ref()
    }

    pub fn declustered(&self) -> &DeclusterSet {
        &self.declustered
    }

    pub fn stable_cache(&self) -> &StableCenterCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Current cluster list, from the last committed recompute.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Tier used for the current cluster list.
    pub fn tier(&self) -> Option<ClusterTier> {
        self.tier
    }

    pub fn last_stats(&self) -> Option<&RecomputeStats> {
        self.last_stats.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the working dataset.
    ///
    /// The stable-center cache is cleared when the content differs from the
    /// previous dataset; reloading identical points keeps every pinned center.
    pub fn set_points(&mut self, points: impl IntoIterator<Item = Point>) -> IngestReport {
        let (points, report) = ingest_points(points);
        self.metrics
            .inc_counter("points.rejected_non_finite", report.rejected_non_finite as u64);
        self.metrics
            .inc_counter("points.rejected_duplicate_id", report.rejected_duplicate_id as u64);
        self.metrics.set_gauge("points.loaded", report.accepted as i64);

        let digest = dataset_digest(&points);
        if self.dataset_digest != Some(digest) {
            if !self.cache.is_empty() {
                debug!(entries = self.cache.len(), "dataset changed; clearing stable centers");
            }
            self.cache.clear();
            self.dataset_digest = Some(digest);
        }
        self.points = points;
        self.reassign();
        info!(
            accepted = report.accepted,
            rejected_non_finite = report.rejected_non_finite,
            rejected_duplicate_id = report.rejected_duplicate_id,
            "points loaded"
        );
        report
    }

    pub fn set_point_records(&mut self, records: Vec<PointRecord>) -> IngestReport {
        self.set_points(records.into_iter().map(Point::from))
    }

    pub fn set_points_json(&mut self, payload: &str) -> Result<IngestReport, ClusterError> {
        let records = parse_point_list(payload)?;
        Ok(self.set_point_records(records))
    }

    /// Replaces the region index.
    ///
    /// On malformed input the previous index is dropped as well and the engine
    /// clusters with the heat strategy at every zoom until valid regions arrive.
    pub fn set_regions(&mut self, collection: &RegionCollection) -> Result<(), ClusterError> {
        self.install_regions(RegionIndex::load(collection))
    }

    pub fn set_regions_geojson(&mut self, payload: &str) -> Result<(), ClusterError> {
        self.install_regions(RegionIndex::from_geojson_str(payload))
    }

    fn install_regions(
        &mut self,
        loaded: Result<RegionIndex, ClusterError>,
    ) -> Result<(), ClusterError> {
        match loaded {
            Ok(index) => {
                let dropped = self.declustered.retain(|name| index.index_of(name).is_some());
                for name in &dropped {
                    debug!(region = %name, "declustered region no longer exists");
                }
                info!(regions = index.len(), "regions loaded");
                self.regions = Some(index);
                self.reassign();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "invalid region collection; falling back to heat clustering");
                self.metrics.inc_counter("regions.rejected", 1);
                self.regions = None;
                self.declustered.clear();
                self.reassign();
                Err(e)
            }
        }
    }

    fn reassign(&mut self) {
        self.assignments = match &self.regions {
            Some(index) => self
                .points
                .iter()
                .map(|p| index.find_region_index(p.position))
                .collect(),
            None => vec![None; self.points.len()],
        };
    }

    /// Forces a region's members to render individually.
    ///
    /// Returns the bounds of the region's members (if it has any) so the caller
    /// can fit the viewport to them.
    pub fn decluster_region(&mut self, name: &str) -> Result<Option<GeoBounds>, ClusterError> {
        let bounds = self.member_bounds_of(name)?;
        if self.declustered.insert(name) {
            self.metrics.inc_counter("decluster.entered", 1);
            info!(region = %name, "region declustered");
        }
        Ok(bounds)
    }

    /// Returns `true` if the region was declustered.
    pub fn recluster_region(&mut self, name: &str) -> bool {
        let removed = self.declustered.remove(name);
        if removed {
            self.metrics.inc_counter("decluster.exited", 1);
            info!(region = %name, "region reclustered");
        }
        removed
    }

    pub fn is_declustered(&self, name: &str) -> bool {
        self.declustered.contains(name)
    }

    /// Bounding box of the loaded points that fall in `name`.
    pub fn member_bounds_of(&self, name: &str) -> Result<Option<GeoBounds>, ClusterError> {
        let region = self
            .regions
            .as_ref()
            .and_then(|index| index.index_of(name))
            .ok_or_else(|| ClusterError::UnknownRegion(name.to_string()))?;
        Ok(GeoBounds::from_points(
            self.members_of(region).map(|p| &p.position),
        ))
    }

    fn members_of(&self, region: usize) -> impl Iterator<Item = &Arc<Point>> {
        self.points
            .iter()
            .zip(&self.assignments)
            .filter(move |(_, assigned)| **assigned == Some(region))
            .map(|(p, _)| p)
    }

    /// Tier that will actually run at `zoom`: without a region index every
    /// zoom clusters with the heat strategy.
    pub fn effective_tier(&self, zoom: f64) -> ClusterTier {
        if self.regions.is_none() {
            return ClusterTier::Heat;
        }
        ClusterTier::for_zoom(zoom, &self.config.tiers)
    }

    /// Runs one clustering pass for `viewport` without publishing it.
    ///
    /// Decluster exits are decided here but only applied by `commit`, so a
    /// discarded computation leaves the decluster set untouched.
    pub fn compute(&mut self, viewport: &Viewport) -> Result<Computation, ClusterError> {
        viewport.validate()?;
        let nominal = ClusterTier::for_zoom(viewport.zoom, &self.config.tiers);
        let tier = self.effective_tier(viewport.zoom);

        let mut declustered = self.declustered.clone();
        let reclustered = if nominal == ClusterTier::Heat {
            let all: Vec<String> = declustered.iter().map(str::to_string).collect();
            declustered.clear();
            all
        } else {
            declustered.retain(|name| self.has_visible_member(name, &viewport.bounds))
        };

        let candidates = select_candidate_indices(&self.points, viewport, &self.config.viewport);
        let mut unmatched = 0;
        let clusters = match tier {
            ClusterTier::Heat => {
                let selected: Vec<Arc<Point>> = candidates
                    .iter()
                    .map(|&i| Arc::clone(&self.points[i]))
                    .collect();
                cluster_heat(&selected, viewport.zoom, &self.config.heat, &mut self.cache)?
            }
            ClusterTier::Region => {
                let index = self.regions.as_ref().ok_or_else(|| {
                    ClusterError::InvariantViolation("region tier without regions".to_string())
                })?;
                let mut layout = OverlapLayout::new(self.config.overlap);
                let outcome = cluster_regions(
                    &self.points,
                    &self.assignments,
                    &candidates,
                    index,
                    &declustered,
                    &mut layout,
                    &mut self.cache,
                )?;
                unmatched = outcome.unmatched.len();
                outcome.clusters
            }
            ClusterTier::Individual => {
                let selected: Vec<Arc<Point>> = candidates
                    .iter()
                    .map(|&i| Arc::clone(&self.points[i]))
                    .collect();
                OverlapLayout::new(self.config.overlap).separate(&selected)?
            }
        };
        validate_partition(&clusters)?;

        let stats = RecomputeStats {
            generation: self.generation + 1,
            tier,
            zoom: viewport.zoom,
            candidates: candidates.len(),
            clusters: clusters.len(),
            unmatched,
            declustered: if tier == ClusterTier::Region {
                declustered.len()
            } else {
                0
            },
        };
        Ok(Computation {
            clusters,
            tier,
            stats,
            declustered,
            reclustered,
        })
    }

    fn has_visible_member(&self, name: &str, bounds: &GeoBounds) -> bool {
        let Some(region) = self.regions.as_ref().and_then(|index| index.index_of(name)) else {
            return false;
        };
        self.members_of(region).any(|p| bounds.contains(p.position))
    }

    /// Publishes a computation as the current cluster list.
    pub fn commit(&mut self, computation: Computation) -> RecomputeStats {
        let Computation {
            clusters,
            tier,
            mut stats,
            declustered,
            reclustered,
        } = computation;

        for name in &reclustered {
            info!(region = %name, "region reclustered after leaving view");
        }
        self.metrics
            .inc_counter("decluster.exited", reclustered.len() as u64);
        self.metrics.inc_counter("recompute.committed", 1);
        self.metrics
            .inc_counter("region.unmatched", stats.unmatched as u64);
        self.metrics.set_gauge("clusters", clusters.len() as i64);

        self.generation += 1;
        stats.generation = self.generation;
        self.declustered = declustered;
        self.clusters = clusters;
        self.tier = Some(tier);
        self.last_stats = Some(stats.clone());
        debug!(
            generation = stats.generation,
            tier = %stats.tier,
            clusters = stats.clusters,
            "clusters updated"
        );
        stats
    }

    pub fn recompute(&mut self, viewport: &Viewport) -> Result<RecomputeStats, ClusterError> {
        let computation = self.compute(viewport)?;
        Ok(self.commit(computation))
    }

    /// Members of the cluster whose marker is nearest to `at`, if it lies within
    /// the configured pixel radius at `zoom`.
    pub fn find_cluster_at(&self, at: LatLng, zoom: f64) -> Option<&[Arc<Point>]> {
        if !at.is_finite() || !zoom.is_finite() {
            return None;
        }
        let radius_km =
            self.config.hit_test.radius_px * ground_resolution_m_per_px(at.lat, zoom) / 1000.0;
        self.clusters
            .iter()
            .map(|c| (c, haversine_km(at, c.centroid)))
            .filter(|(_, d)| *d <= radius_km)
            .min_by(|(_, a), (_, b)| stable_total_cmp_f64(*a, *b))
            .map(|(c, _)| c.members.as_slice())
    }
}

fn dataset_digest(points: &[Arc<Point>]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(points.len() as u64).to_le_bytes());
    for p in points {
        let id = p.id.as_str();
        hasher.update(&(id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
        for v in [p.position.lat, p.position.lng, p.popularity] {
            hasher.update(&canonical_f64(v).to_bits().to_le_bytes());
        }
        hasher.update(&(p.attributes.len() as u64).to_le_bytes());
        for (key, v) in &p.attributes {
            hasher.update(&(key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update(&canonical_f64(*v).to_bits().to_le_bytes());
        }
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use foundation::{GeoBounds, LatLng};
    use pretty_assertions::assert_eq;

    use super::ClusterEngine;
    use crate::error::ClusterError;
    use crate::point::Point;
    use crate::tier::ClusterTier;
    use crate::viewport::Viewport;

    const SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "West"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[0.1,0],[0.1,0.1],[0,0.1],[0,0]]]}},
            {"type": "Feature", "properties": {"name": "East"},
             "geometry": {"type": "Polygon", "coordinates": [[[0.2,0],[0.3,0],[0.3,0.1],[0.2,0.1],[0.2,0]]]}}
        ]
    }"#;

    fn engine() -> ClusterEngine {
        let mut engine = ClusterEngine::default();
        engine.set_regions_geojson(SQUARES).unwrap();
        engine.set_points(vec![
            Point::new("w1", 0.02, 0.02),
            Point::new("w2", 0.05, 0.05),
            Point::new("e1", 0.05, 0.25),
        ]);
        engine
    }

    fn view(zoom: f64) -> Viewport {
        Viewport::new(GeoBounds::new(-0.05, -0.05, 0.15, 0.35), zoom)
    }

    #[test]
    fn region_tier_yields_one_cluster_per_region() {
        let mut engine = engine();
        let stats = engine.recompute(&view(12.0)).unwrap();
        assert_eq!(stats.tier, ClusterTier::Region);
        assert_eq!(stats.generation, 1);
        let ids: Vec<&str> = engine.clusters().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["region:West", "region:East"]);
    }

    #[test]
    fn decluster_unknown_region_is_an_error() {
        let mut engine = engine();
        assert_eq!(
            engine.decluster_region("North"),
            Err(ClusterError::UnknownRegion("North".to_string()))
        );
        let bounds = engine.decluster_region("West").unwrap().unwrap();
        assert_eq!(bounds, GeoBounds::new(0.02, 0.02, 0.05, 0.05));
    }

    #[test]
    fn zooming_out_to_heat_clears_declusters() {
        let mut engine = engine();
        engine.decluster_region("West").unwrap();
        engine.recompute(&view(12.0)).unwrap();
        assert!(engine.is_declustered("West"));

        engine.recompute(&view(9.0)).unwrap();
        assert!(!engine.is_declustered("West"));
        assert_eq!(engine.tier(), Some(ClusterTier::Heat));
    }

    #[test]
    fn failed_compute_keeps_previous_clusters() {
        let mut engine = engine();
        engine.recompute(&view(12.0)).unwrap();
        let before = engine.clusters().to_vec();

        let bad = Viewport::new(GeoBounds::new(0.0, 0.0, 1.0, 1.0), f64::NAN);
        assert!(engine.recompute(&bad).is_err());
        assert_eq!(engine.clusters(), before.as_slice());
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn malformed_regions_fall_back_to_heat() {
        let mut engine = engine();
        engine.decluster_region("West").unwrap();
        let err = engine.set_regions_geojson(r#"{"type": "Point"}"#).unwrap_err();
        assert!(matches!(err, ClusterError::Data(_)));
        assert!(engine.regions().is_none());
        assert!(engine.declustered().is_empty());
        assert_eq!(engine.effective_tier(13.0), ClusterTier::Heat);
        assert_eq!(engine.effective_tier(16.0), ClusterTier::Heat);
    }

    #[test]
    fn identical_reload_keeps_stable_centers() {
        let mut engine = engine();
        engine.recompute(&view(12.0)).unwrap();
        let cached = engine.stable_cache().len();
        assert!(cached > 0);

        engine.set_points(vec![
            Point::new("w1", 0.02, 0.02),
            Point::new("w2", 0.05, 0.05),
            Point::new("e1", 0.05, 0.25),
        ]);
        assert_eq!(engine.stable_cache().len(), cached);

        engine.set_points(vec![Point::new("w1", 0.03, 0.02)]);
        assert!(engine.stable_cache().is_empty());
    }

    #[test]
    fn hit_test_returns_nearest_cluster_members() {
        let mut engine = engine();
        engine.recompute(&view(12.0)).unwrap();
        let west = engine.clusters()[0].centroid;

        let members = engine.find_cluster_at(west, 12.0).unwrap();
        assert_eq!(members.len(), 2);
        assert!(engine.find_cluster_at(LatLng::new(0.5, 0.5), 12.0).is_none());
    }
}
