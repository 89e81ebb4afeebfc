//! Anti-overlap placement for individually rendered points.
//!
//! Points whose coordinates fall in the same grid cell are fanned out on a
//! golden-angle spiral around the first point seen in that cell. The n-th
//! collider (n >= 1) sits at angle `n * golden_angle` and distance `n * step`.
//! Placement depends only on input order, never on randomness.

use std::collections::HashMap;
use std::sync::Arc;

use foundation::LatLng;
use foundation::math::quantize;

use crate::cluster::{Cluster, ClusterMeta};
use crate::config::OverlapConfig;
use crate::error::ClusterError;
use crate::point::Point;

/// Longitude offsets are scaled by `1 / cos(lat)`; this floor keeps the
/// scale bounded near the poles.
const MIN_COS_LAT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: LatLng,
    /// Number of earlier points that shared the cell (0 = kept true position).
    pub collisions: u32,
}

/// Running spiral state. One layout should span every point placed in a
/// single recompute so colliders from different groups still fan out.
#[derive(Debug)]
pub struct OverlapLayout {
    config: OverlapConfig,
    occupancy: HashMap<(i64, i64), u32>,
}

impl OverlapLayout {
    pub fn new(config: OverlapConfig) -> Self {
        Self {
            config,
            occupancy: HashMap::new(),
        }
    }

    pub fn place(&mut self, position: LatLng) -> Placement {
        let cell = match (
            quantize(position.lat, self.config.grid_deg),
            quantize(position.lng, self.config.grid_deg),
        ) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => {
                return Placement {
                    position,
                    collisions: 0,
                };
            }
        };

        let count = self.occupancy.entry(cell).or_insert(0);
        let collisions = *count;
        *count += 1;

        Placement {
            position: spiral_offset(position, collisions, &self.config),
            collisions,
        }
    }

    /// One individual cluster per point, in input order.
    pub fn separate(&mut self, points: &[Arc<Point>]) -> Result<Vec<Cluster>, ClusterError> {
        points
            .iter()
            .map(|p| {
                let placement = self.place(p.position);
                Cluster::build(
                    format!("point:{}", p.id),
                    placement.position,
                    vec![Arc::clone(p)],
                    ClusterMeta::Individual {
                        displaced: placement.collisions > 0,
                    },
                )
            })
            .collect()
    }
}

/// Position of the `n`-th collider around `origin`. `n == 0` is `origin` itself.
pub fn spiral_offset(origin: LatLng, n: u32, config: &OverlapConfig) -> LatLng {
    if n == 0 {
        return origin;
    }
    let n = f64::from(n);
    let angle = (n * config.golden_angle_deg).to_radians();
    let distance = n * config.spiral_step_deg;
    let cos_lat = origin.lat.to_radians().cos().max(MIN_COS_LAT);
    LatLng::new(
        origin.lat + distance * angle.sin(),
        origin.lng + distance * angle.cos() / cos_lat,
    )
}
