//! Heat clustering for far-out zoom levels.
//!
//! Two passes over the candidates:
//! 1. Popular points (weight above the threshold), heaviest first, merge only
//!    with nearby popular points of similar weight; otherwise they stand alone.
//! 2. Everything else groups by plain proximity over a wider radius and needs
//!    `min_regular_cluster_size` members to form a cluster.

use std::sync::Arc;

use foundation::LatLng;
use foundation::math::{StableF64, haversine_km};

use crate::cluster::{Cluster, ClusterMeta, HeatLevel};
use crate::config::HeatConfig;
use crate::error::ClusterError;
use crate::point::Point;
use crate::stable::{CenterPolicy, StableCenterCache};

/// `|a - b| / max(a, b)`; zero when both weights are zero.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let max = a.abs().max(b.abs());
    if max == 0.0 {
        return 0.0;
    }
    (a - b).abs() / max
}

/// Weight-averaged position; falls back to the plain mean when the weights
/// do not sum to something positive.
pub fn weighted_centroid(members: &[(Arc<Point>, f64)]) -> Option<LatLng> {
    let total: f64 = members.iter().map(|(_, w)| w.max(0.0)).sum();
    if !(total > 0.0) {
        return LatLng::mean(members.iter().map(|(p, _)| &p.position));
    }
    let mut lat = 0.0;
    let mut lng = 0.0;
    for (p, w) in members {
        let w = w.max(0.0);
        lat += p.position.lat * w;
        lng += p.position.lng * w;
    }
    Some(LatLng::new(lat / total, lng / total))
}

pub fn cluster_heat(
    candidates: &[Arc<Point>],
    zoom: f64,
    config: &HeatConfig,
    cache: &mut StableCenterCache,
) -> Result<Vec<Cluster>, ClusterError> {
    let weighted: Vec<(Arc<Point>, f64)> = candidates
        .iter()
        .map(|p| (Arc::clone(p), p.heat_weight(&config.attribute_weights)))
        .collect();

    let (mut popular, regular): (Vec<_>, Vec<_>) = weighted
        .into_iter()
        .partition(|(_, w)| *w > config.popular_threshold);
    // Stable sort: equal weights keep input order.
    popular.sort_by(|(_, a), (_, b)| StableF64(*b).cmp(&StableF64(*a)));

    let mut clusters = popular_pass(&popular, config.popular_radius_km_at(zoom), config, cache)?;
    clusters.extend(regular_pass(
        &regular,
        config.regular_radius_km_at(zoom),
        config,
        cache,
    )?);
    Ok(clusters)
}

fn popular_pass(
    popular: &[(Arc<Point>, f64)],
    radius_km: f64,
    config: &HeatConfig,
    cache: &mut StableCenterCache,
) -> Result<Vec<Cluster>, ClusterError> {
    let mut assigned = vec![false; popular.len()];
    let mut out = Vec::new();

    for seed in 0..popular.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let (seed_point, seed_weight) = &popular[seed];

        let mut group = vec![popular[seed].clone()];
        for other in seed + 1..popular.len() {
            if assigned[other] {
                continue;
            }
            let (p, w) = &popular[other];
            if haversine_km(seed_point.position, p.position) <= radius_km
                && relative_difference(*seed_weight, *w) <= config.popularity_tolerance
            {
                assigned[other] = true;
                group.push(popular[other].clone());
            }
        }

        let id = format!("heat:popular:{}", seed_point.id);
        out.push(finish_group(id, group, HeatLevel::Popular, 2, cache)?);
    }
    Ok(out)
}

fn regular_pass(
    regular: &[(Arc<Point>, f64)],
    radius_km: f64,
    config: &HeatConfig,
    cache: &mut StableCenterCache,
) -> Result<Vec<Cluster>, ClusterError> {
    let mut assigned = vec![false; regular.len()];
    let mut out = Vec::new();

    for seed in 0..regular.len() {
        if assigned[seed] {
            continue;
        }
        let seed_position = regular[seed].0.position;
        let neighbors: Vec<usize> = (seed..regular.len())
            .filter(|&i| !assigned[i])
            .filter(|&i| haversine_km(seed_position, regular[i].0.position) <= radius_km)
            .collect();

        // Too small to cluster: the seed alone becomes a singleton and its
        // neighbors stay available to later seeds.
        let members = if neighbors.len() >= config.min_regular_cluster_size {
            neighbors
        } else {
            vec![seed]
        };
        for &i in &members {
            assigned[i] = true;
        }

        let group: Vec<_> = members.iter().map(|&i| regular[i].clone()).collect();
        let id = format!("heat:regular:{}", regular[seed].0.id);
        out.push(finish_group(
            id,
            group,
            HeatLevel::Regular,
            config.min_regular_cluster_size,
            cache,
        )?);
    }
    Ok(out)
}

fn finish_group(
    id: String,
    group: Vec<(Arc<Point>, f64)>,
    level: HeatLevel,
    min_merge: usize,
    cache: &mut StableCenterCache,
) -> Result<Cluster, ClusterError> {
    let total_popularity: f64 = group.iter().map(|(_, w)| *w).sum();
    let merged = group.len() >= min_merge;

    let target = match level {
        HeatLevel::Popular => weighted_centroid(&group),
        HeatLevel::Regular => LatLng::mean(group.iter().map(|(p, _)| &p.position)),
    }
    .ok_or_else(|| ClusterError::InvariantViolation(format!("heat group {id} is empty")))?;

    let members: Vec<Arc<Point>> = group.into_iter().map(|(p, _)| p).collect();

    // Singletons sit on their own point; merged groups get a pinned center.
    let (centroid, stable) = if merged {
        let center = cache
            .center_for(&members, target, CenterPolicy::NearestMember)
            .ok_or_else(|| ClusterError::InvariantViolation(format!("heat group {id} is empty")))?;
        (center.position, center.reused)
    } else {
        (members[0].position, false)
    };

    let mut cluster = Cluster::build(
        id,
        centroid,
        members,
        ClusterMeta::Heat {
            level,
            total_popularity,
        },
    )?;
    cluster.stable = stable;
    Ok(cluster)
}
