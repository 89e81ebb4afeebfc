use std::collections::HashSet;
use std::sync::Arc;

use foundation::math::haversine_km;
use foundation::{GeoBounds, LatLng};
use serde::Serialize;

use crate::error::ClusterError;
use crate::point::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatLevel {
    Popular,
    Regular,
}

/// Tier-specific information the renderer uses to style a marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterMeta {
    Heat {
        level: HeatLevel,
        total_popularity: f64,
    },
    Region {
        region_name: String,
    },
    Individual {
        /// True when the marker was pushed off the point's true position.
        displaced: bool,
    },
}

/// A group of one or more points rendered as a single marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub centroid: LatLng,
    pub members: Vec<Arc<Point>>,
    /// Largest great-circle distance from the centroid to a member (km).
    pub radius_km: f64,
    pub bounds: GeoBounds,
    /// Centroid was served from the stable-center cache.
    pub stable: bool,
    pub meta: ClusterMeta,
}

impl Cluster {
    pub fn build(
        id: impl Into<String>,
        centroid: LatLng,
        members: Vec<Arc<Point>>,
        meta: ClusterMeta,
    ) -> Result<Self, ClusterError> {
        let id = id.into();
        let bounds = GeoBounds::from_points(members.iter().map(|p| &p.position))
            .ok_or_else(|| ClusterError::InvariantViolation(format!("cluster {id} has no members")))?;
        let radius_km = members
            .iter()
            .map(|p| haversine_km(centroid, p.position))
            .fold(0.0, f64::max);
        Ok(Self {
            id,
            centroid,
            members,
            radius_km,
            bounds,
            stable: false,
            meta,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn region_name(&self) -> Option<&str> {
        match &self.meta {
            ClusterMeta::Region { region_name } => Some(region_name),
            _ => None,
        }
    }
}

/// Checks the partition contract: no empty cluster, no point in two clusters.
pub fn validate_partition(clusters: &[Cluster]) -> Result<(), ClusterError> {
    let mut seen = HashSet::new();
    for cluster in clusters {
        if cluster.members.is_empty() {
            return Err(ClusterError::InvariantViolation(format!(
                "cluster {} has no members",
                cluster.id
            )));
        }
        for member in &cluster.members {
            if !seen.insert(&member.id) {
                return Err(ClusterError::InvariantViolation(format!(
                    "point {} appears in more than one cluster",
                    member.id
                )));
            }
        }
    }
    Ok(())
}
