use std::collections::BTreeSet;

use clustering::{
    ClusterEngine, ClusterMeta, ClusterSession, ClusterTier, Point, TickOutcome, Viewport,
};
use foundation::time::Time;
use foundation::{GeoBounds, LatLng};
use pretty_assertions::assert_eq;

/// Three 0.1° squares side by side along the equator.
const THREE_REGIONS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"name": "Alpha"},
         "geometry": {"type": "Polygon", "coordinates": [[[0.0,0.0],[0.1,0.0],[0.1,0.1],[0.0,0.1],[0.0,0.0]]]}},
        {"type": "Feature", "properties": {"name": "Bravo"},
         "geometry": {"type": "Polygon", "coordinates": [[[0.2,0.0],[0.3,0.0],[0.3,0.1],[0.2,0.1],[0.2,0.0]]]}},
        {"type": "Feature", "properties": {"name": "Charlie"},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[0.4,0.0],[0.5,0.0],[0.5,0.1],[0.4,0.1],[0.4,0.0]]]]}}
    ]
}"#;

const REGION_NAMES: [&str; 3] = ["Alpha", "Bravo", "Charlie"];

/// 50 points spread over the three squares on a fixed lattice.
fn scattered_points() -> Vec<Point> {
    (0..50)
        .map(|i| {
            let region = i % 3;
            let lat = 0.005 + ((i * 7) % 19) as f64 * 0.005;
            let lng = region as f64 * 0.2 + 0.005 + ((i * 11) % 17) as f64 * 0.005;
            Point::new(format!("evt-{i:02}"), lat, lng).with_popularity((i % 10) as f64)
        })
        .collect()
}

fn loaded_engine() -> ClusterEngine {
    let mut engine = ClusterEngine::default();
    engine.set_regions_geojson(THREE_REGIONS).unwrap();
    let report = engine.set_points(scattered_points());
    assert_eq!(report.accepted, 50);
    engine
}

fn whole_area(zoom: f64) -> Viewport {
    Viewport::new(GeoBounds::new(-0.01, -0.01, 0.11, 0.51), zoom)
}

fn expected_members(region: usize) -> BTreeSet<String> {
    (0..50)
        .filter(|i| i % 3 == region)
        .map(|i| format!("evt-{i:02}"))
        .collect()
}

#[test]
fn fifty_points_in_three_regions_give_three_mean_centered_clusters() {
    let mut engine = loaded_engine();
    let stats = engine.recompute(&whole_area(12.0)).unwrap();
    assert_eq!(stats.tier, ClusterTier::Region);
    assert_eq!(stats.candidates, 50);
    assert_eq!(stats.unmatched, 0);

    let clusters = engine.clusters();
    assert_eq!(clusters.len(), 3);
    for (i, cluster) in clusters.iter().enumerate() {
        assert_eq!(cluster.region_name(), Some(REGION_NAMES[i]));
        let ids: BTreeSet<String> = cluster.members.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(ids, expected_members(i));

        let mean = LatLng::mean(cluster.members.iter().map(|p| &p.position)).unwrap();
        assert_eq!(cluster.centroid, mean);
    }
}

#[test]
fn every_candidate_is_clustered_once_or_reported_unmatched() {
    let mut engine = ClusterEngine::default();
    engine.set_regions_geojson(THREE_REGIONS).unwrap();
    let mut points = scattered_points();
    points.push(Point::new("gap", 0.05, 0.15));
    points.push(Point::new("bad", f64::NAN, 0.05));
    let report = engine.set_points(points);
    assert_eq!(report.rejected_non_finite, 1);

    let stats = engine.recompute(&whole_area(13.0)).unwrap();
    assert_eq!(stats.candidates, 51);
    assert_eq!(stats.unmatched, 1);

    let mut seen = BTreeSet::new();
    for cluster in engine.clusters() {
        assert!(!cluster.is_empty());
        for member in &cluster.members {
            assert!(seen.insert(member.id.to_string()), "{} clustered twice", member.id);
        }
    }
    assert_eq!(seen.len(), 50);
    assert!(!seen.contains("gap"));
}

#[test]
fn unchanged_input_yields_bit_identical_centroids() {
    for zoom in [8.0, 12.0, 16.0] {
        let mut engine = loaded_engine();
        engine.recompute(&whole_area(zoom)).unwrap();
        let first: Vec<(String, u64, u64)> = engine
            .clusters()
            .iter()
            .map(|c| (c.id.clone(), c.centroid.lat.to_bits(), c.centroid.lng.to_bits()))
            .collect();

        engine.set_points(scattered_points());
        engine.recompute(&whole_area(zoom)).unwrap();
        let second: Vec<(String, u64, u64)> = engine
            .clusters()
            .iter()
            .map(|c| (c.id.clone(), c.centroid.lat.to_bits(), c.centroid.lng.to_bits()))
            .collect();

        assert_eq!(first, second, "zoom {zoom}");
    }
}

#[test]
fn decluster_lifecycle_expands_then_silently_reclusters() {
    let mut engine = loaded_engine();
    let bounds = engine.decluster_region("Bravo").unwrap().unwrap();
    assert!(bounds.west >= 0.2 && bounds.east <= 0.3);

    engine.recompute(&whole_area(12.0)).unwrap();
    let bravo = expected_members(1);
    let individual: Vec<_> = engine
        .clusters()
        .iter()
        .filter(|c| matches!(c.meta, ClusterMeta::Individual { .. }))
        .collect();
    assert_eq!(individual.len(), bravo.len());
    assert!(individual.iter().all(|c| c.len() == 1));
    assert!(engine.clusters().iter().all(|c| c.region_name() != Some("Bravo")));

    // Pan so only Alpha is on screen: Bravo has no visible member and leaves the set.
    let alpha_only = Viewport::new(GeoBounds::new(-0.01, -0.01, 0.11, 0.11), 12.0);
    engine.recompute(&alpha_only).unwrap();
    assert!(!engine.is_declustered("Bravo"));

    engine.recompute(&whole_area(12.0)).unwrap();
    let bravo_clusters: Vec<_> = engine
        .clusters()
        .iter()
        .filter(|c| c.region_name() == Some("Bravo"))
        .collect();
    assert_eq!(bravo_clusters.len(), 1);
    assert_eq!(bravo_clusters[0].len(), bravo.len());
}

#[test]
fn declustered_region_seen_only_in_the_margin_reclusters() {
    let mut engine = loaded_engine();
    engine.decluster_region("Bravo").unwrap();

    // Bravo starts at lng 0.2: outside the visible box, inside the 25% margin.
    let near_bravo = Viewport::new(GeoBounds::new(-0.01, 0.0, 0.11, 0.19), 12.0);
    let stats = engine.recompute(&near_bravo).unwrap();
    assert!(!engine.is_declustered("Bravo"));
    assert_eq!(stats.declustered, 0);
    assert!(stats.candidates > expected_members(0).len());

    assert!(
        engine
            .clusters()
            .iter()
            .all(|c| !matches!(c.meta, ClusterMeta::Individual { .. }))
    );
    let bravo: Vec<_> = engine
        .clusters()
        .iter()
        .filter(|c| c.region_name() == Some("Bravo"))
        .collect();
    assert_eq!(bravo.len(), 1);
    assert!(bravo[0].len() < expected_members(1).len());
}

#[test]
fn zoom_tier_boundaries_are_exact() {
    let mut engine = loaded_engine();
    for (zoom, tier) in [
        (10.9, ClusterTier::Heat),
        (11.0, ClusterTier::Region),
        (14.9, ClusterTier::Region),
        (15.0, ClusterTier::Individual),
    ] {
        let stats = engine.recompute(&whole_area(zoom)).unwrap();
        assert_eq!(stats.tier, tier, "zoom {zoom}");
    }
}

#[test]
fn malformed_regions_fall_back_to_heat_at_every_zoom() {
    let mut engine = loaded_engine();
    assert!(engine.set_regions_geojson("{ not json").is_err());
    for zoom in [9.0, 12.0, 16.0] {
        let stats = engine.recompute(&whole_area(zoom)).unwrap();
        assert_eq!(stats.tier, ClusterTier::Heat);
    }

    engine.set_regions_geojson(THREE_REGIONS).unwrap();
    let stats = engine.recompute(&whole_area(12.0)).unwrap();
    assert_eq!(stats.tier, ClusterTier::Region);
}

#[test]
fn session_debounces_viewport_bursts() {
    let mut session = ClusterSession::default();
    session.set_regions_geojson(THREE_REGIONS).unwrap();
    session.set_points(scattered_points());

    let mut now = Time::ZERO;
    for zoom in [9.0, 10.0, 11.0, 12.0] {
        session.on_viewport_change(whole_area(zoom), now);
        now = now.plus_millis(40);
        assert_eq!(session.tick(now), TickOutcome::Idle);
    }

    let outcome = session.tick(now.plus_millis(200));
    let TickOutcome::Recomputed(stats) = outcome else {
        panic!("expected one recompute, got {outcome:?}");
    };
    assert_eq!(stats.zoom, 12.0);
    assert_eq!(session.clusters().len(), 3);

    let sched = session.scheduler_stats();
    assert_eq!(sched.signals, 4);
    assert_eq!(sched.coalesced, 3);
    assert_eq!(sched.started, 1);
}

#[test]
fn hit_test_finds_region_cluster_members() {
    let mut engine = loaded_engine();
    engine.recompute(&whole_area(12.0)).unwrap();
    let charlie = engine.clusters()[2].centroid;
    let members = engine.find_cluster_at(charlie, 12.0).unwrap();
    assert_eq!(members.len(), expected_members(2).len());
}
