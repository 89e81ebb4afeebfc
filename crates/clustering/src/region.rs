//! Region-tier strategy: one cluster per region bucket, with declustered
//! regions handed to overlap separation instead.

use std::sync::Arc;

use foundation::LatLng;
use tracing::{debug, info};

use crate::cluster::{Cluster, ClusterMeta};
use crate::decluster::DeclusterSet;
use crate::error::ClusterError;
use crate::overlap::OverlapLayout;
use crate::point::Point;
use crate::region_index::RegionIndex;
use crate::stable::{CenterPolicy, StableCenterCache};

#[derive(Debug, Default)]
pub struct RegionOutcome {
    pub clusters: Vec<Cluster>,
    /// Candidates that fell outside every region.
    pub unmatched: Vec<Arc<Point>>,
}

/// Groups candidates by their precomputed region.
///
/// `candidates` are indices into `points`; `assignments[i]` is the region index
/// of `points[i]`. Clusters come out in region-index order, declustered regions
/// after all aggregate clusters.
pub fn cluster_regions(
    points: &[Arc<Point>],
    assignments: &[Option<usize>],
    candidates: &[usize],
    index: &RegionIndex,
    declustered: &DeclusterSet,
    layout: &mut OverlapLayout,
    cache: &mut StableCenterCache,
) -> Result<RegionOutcome, ClusterError> {
    let mut buckets: Vec<Vec<Arc<Point>>> = vec![Vec::new(); index.len()];
    let mut unmatched = Vec::new();

    for &i in candidates {
        let point = points.get(i).ok_or_else(|| {
            ClusterError::InvariantViolation(format!("candidate index {i} out of range"))
        })?;
        match assignments.get(i).copied().flatten() {
            Some(r) if r < buckets.len() => buckets[r].push(Arc::clone(point)),
            Some(r) => {
                return Err(ClusterError::InvariantViolation(format!(
                    "point {} assigned to unknown region index {r}",
                    point.id
                )));
            }
            None => {
                debug!(point_id = %point.id, "point matches no region");
                unmatched.push(Arc::clone(point));
            }
        }
    }
    if !unmatched.is_empty() {
        info!(unmatched = unmatched.len(), "region coverage gap");
    }

    let mut clusters = Vec::new();
    let mut expanded = Vec::new();
    for (region, members) in index.regions().iter().zip(buckets) {
        if members.is_empty() {
            continue;
        }
        if declustered.contains(&region.name) {
            expanded.push(members);
            continue;
        }

        let mean = LatLng::mean(members.iter().map(|p| &p.position)).ok_or_else(|| {
            ClusterError::InvariantViolation(format!("region {} has no members", region.name))
        })?;
        let center = cache
            .center_for(&members, mean, CenterPolicy::Target)
            .ok_or_else(|| {
                ClusterError::InvariantViolation(format!("region {} has no center", region.name))
            })?;
        let mut cluster = Cluster::build(
            format!("region:{}", region.name),
            center.position,
            members,
            ClusterMeta::Region {
                region_name: region.name.clone(),
            },
        )?;
        cluster.stable = center.reused;
        clusters.push(cluster);
    }

    for members in expanded {
        clusters.extend(layout.separate(&members)?);
    }

    Ok(RegionOutcome {
        clusters,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use foundation::LatLng;
    use pretty_assertions::assert_eq;

    use super::cluster_regions;
    use crate::cluster::ClusterMeta;
    use crate::config::OverlapConfig;
    use crate::decluster::DeclusterSet;
    use crate::overlap::OverlapLayout;
    use crate::point::Point;
    use crate::region_index::RegionIndex;
    use crate::stable::StableCenterCache;

    const TWO_SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "West"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"name": "East"},
             "geometry": {"type": "Polygon", "coordinates": [[[2,0],[3,0],[3,1],[2,1],[2,0]]]}}
        ]
    }"#;

    fn fixture() -> (Vec<Arc<Point>>, Vec<Option<usize>>, RegionIndex) {
        let index = RegionIndex::from_geojson_str(TWO_SQUARES).unwrap();
        let points: Vec<Arc<Point>> = [
            ("w1", 0.2, 0.2),
            ("e1", 0.5, 2.5),
            ("w2", 0.4, 0.6),
            ("nowhere", 0.5, 1.5),
        ]
        .into_iter()
        .map(|(id, lat, lng)| Arc::new(Point::new(id, lat, lng)))
        .collect();
        let assignments = points
            .iter()
            .map(|p| index.find_region_index(p.position))
            .collect();
        (points, assignments, index)
    }

    #[test]
    fn one_cluster_per_region_at_member_mean() {
        let (points, assignments, index) = fixture();
        let all: Vec<usize> = (0..points.len()).collect();
        let outcome = cluster_regions(
            &points,
            &assignments,
            &all,
            &index,
            &DeclusterSet::new(),
            &mut OverlapLayout::new(OverlapConfig::default()),
            &mut StableCenterCache::new(),
        )
        .unwrap();

        let ids: Vec<&str> = outcome.clusters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["region:West", "region:East"]);
        assert_eq!(outcome.clusters[0].len(), 2);
        let expected = LatLng::mean([LatLng::new(0.2, 0.2), LatLng::new(0.4, 0.6)].iter()).unwrap();
        assert_eq!(outcome.clusters[0].centroid, expected);
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].id.as_str(), "nowhere");
    }

    #[test]
    fn declustered_region_renders_members_individually() {
        let (points, assignments, index) = fixture();
        let all: Vec<usize> = (0..points.len()).collect();
        let mut declustered = DeclusterSet::new();
        declustered.insert("West");
        let outcome = cluster_regions(
            &points,
            &assignments,
            &all,
            &index,
            &declustered,
            &mut OverlapLayout::new(OverlapConfig::default()),
            &mut StableCenterCache::new(),
        )
        .unwrap();

        let ids: Vec<&str> = outcome.clusters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["region:East", "point:w1", "point:w2"]);
        assert!(matches!(
            outcome.clusters[1].meta,
            ClusterMeta::Individual { .. }
        ));
    }

    #[test]
    fn second_run_reuses_pinned_center() {
        let (points, assignments, index) = fixture();
        let all: Vec<usize> = (0..points.len()).collect();
        let mut cache = StableCenterCache::new();
        let mut run = || {
            cluster_regions(
                &points,
                &assignments,
                &all,
                &index,
                &DeclusterSet::new(),
                &mut OverlapLayout::new(OverlapConfig::default()),
                &mut cache,
            )
            .unwrap()
        };
        let first = run();
        let second = run();
        assert!(!first.clusters[0].stable);
        assert!(second.clusters[0].stable);
        assert_eq!(
            first.clusters[0].centroid.lat.to_bits(),
            second.clusters[0].centroid.lat.to_bits()
        );
    }
}
