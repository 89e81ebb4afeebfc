//! Geometry kernel: ring containment, vertex centroid.
//!
//! Coordinates are treated as planar `(x = lng, y = lat)`. This is accurate
//! enough for neighborhood-scale polygons and matches how boundaries are drawn
//! on a Web-Mercator map.

use crate::geo::LatLng;

/// Even-odd ray casting against a single ring.
///
/// The ring may or may not repeat its first vertex at the end. Points exactly on
/// an edge may land on either side. NaN coordinates never panic; every
/// comparison involving NaN is false so the point is reported outside.
pub fn point_in_ring(p: LatLng, ring: &[LatLng]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let (x, y) = (p.lng, p.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng, ring[i].lat);
        let (xj, yj) = (ring[j].lng, ring[j].lat);
        // `(yi > y) != (yj > y)` guarantees yi != yj, so the division is safe.
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Polygon-with-holes containment.
///
/// `rings[0]` is the outer boundary; every following ring is a hole. A point
/// is inside when it is inside the outer ring and inside none of the holes.
pub fn point_in_polygon(p: LatLng, rings: &[Vec<LatLng>]) -> bool {
    if !p.is_finite() {
        return false;
    }
    let Some((outer, holes)) = rings.split_first() else {
        return false;
    };
    if !point_in_ring(p, outer) {
        return false;
    }
    !holes.iter().any(|hole| point_in_ring(p, hole))
}

/// The ring's distinct vertices: a closing vertex that repeats the first one
/// is dropped.
pub fn open_ring(ring: &[LatLng]) -> &[LatLng] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

/// Arithmetic mean of the ring's vertices.
///
/// This is a vertex average, not the area-weighted polygon centroid; for
/// irregular outlines it drifts toward densely digitized edges. A closing
/// vertex that repeats the first one is counted once.
pub fn ring_centroid(ring: &[LatLng]) -> Option<LatLng> {
    LatLng::mean(open_ring(ring))
}

#[cfg(test)]
mod tests {
    use super::{open_ring, point_in_polygon, point_in_ring, ring_centroid};
    use crate::geo::LatLng;

    fn square(min: f64, max: f64) -> Vec<LatLng> {
        vec![
            LatLng::new(min, min),
            LatLng::new(min, max),
            LatLng::new(max, max),
            LatLng::new(max, min),
            LatLng::new(min, min),
        ]
    }

    #[test]
    fn square_with_hole() {
        let rings = vec![square(0.0, 10.0), square(4.0, 6.0)];
        // In the ring.
        assert!(point_in_polygon(LatLng::new(1.0, 1.0), &rings));
        assert!(point_in_polygon(LatLng::new(8.0, 5.0), &rings));
        // In the hole.
        assert!(!point_in_polygon(LatLng::new(5.0, 5.0), &rings));
        // Outside.
        assert!(!point_in_polygon(LatLng::new(11.0, 5.0), &rings));
        assert!(!point_in_polygon(LatLng::new(-0.5, -0.5), &rings));
    }

    #[test]
    fn open_and_closed_rings_agree() {
        let closed = square(0.0, 2.0);
        let open = closed[..4].to_vec();
        let p = LatLng::new(1.0, 1.5);
        assert_eq!(point_in_ring(p, &closed), point_in_ring(p, &open));
        assert!(point_in_ring(p, &open));
    }

    #[test]
    fn nan_never_matches_or_panics() {
        let rings = vec![square(0.0, 10.0)];
        assert!(!point_in_polygon(LatLng::new(f64::NAN, 1.0), &rings));

        let broken = vec![vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(f64::NAN, 5.0),
            LatLng::new(5.0, 5.0),
        ]];
        let _ = point_in_polygon(LatLng::new(1.0, 1.0), &broken);
    }

    #[test]
    fn degenerate_inputs_are_outside() {
        assert!(!point_in_polygon(LatLng::new(0.0, 0.0), &[]));
        assert!(!point_in_ring(LatLng::new(0.0, 0.0), &square(0.0, 1.0)[..2]));
    }

    #[test]
    fn centroid_is_vertex_mean_without_closing_duplicate() {
        let c = ring_centroid(&square(0.0, 4.0)).unwrap();
        assert_eq!(c, LatLng::new(2.0, 2.0));
        assert!(ring_centroid(&[]).is_none());
    }

    #[test]
    fn open_ring_drops_only_a_repeated_closing_vertex() {
        let closed = square(0.0, 1.0);
        assert_eq!(open_ring(&closed), &closed[..4]);
        assert_eq!(open_ring(&closed[..4]), &closed[..4]);
        let single = [LatLng::new(1.0, 1.0)];
        assert_eq!(open_ring(&single), &single[..]);
        assert!(open_ring(&[]).is_empty());
    }
}
