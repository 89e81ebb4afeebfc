use std::collections::HashMap;
use std::sync::Arc;

use foundation::LatLng;
use foundation::math::{haversine_km, stable_total_cmp_f64};

use crate::point::Point;

/// Bytes of the blake3 digest kept as the composition key.
pub const FINGERPRINT_LEN: usize = 16;

/// How a fresh center is chosen on a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CenterPolicy {
    /// Keep the supplied target (e.g. the members' arithmetic mean).
    Target,
    /// Snap to the member closest to the target so the marker sits on a real point.
    NearestMember,
}

impl CenterPolicy {
    fn tag(self) -> u8 {
        match self {
            CenterPolicy::Target => 0,
            CenterPolicy::NearestMember => 1,
        }
    }
}

/// Truncated digest of a sorted member-id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn of(members: &[Arc<Point>], policy: CenterPolicy) -> Self {
        let mut ids: Vec<&str> = members.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&[policy.tag()]);
        hasher.update(&(ids.len() as u64).to_le_bytes());
        for id in ids {
            hasher.update(&(id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
        }
        let digest = hasher.finalize();
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(&digest.as_bytes()[..FINGERPRINT_LEN]);
        Fingerprint(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableCenter {
    pub position: LatLng,
    /// The position came from an earlier recompute.
    pub reused: bool,
}

/// Remembers where each cluster composition was placed.
///
/// Unchanged membership always maps back to the same bit-identical center,
/// whatever order the members arrive in. Entries are only dropped by `clear`.
#[derive(Debug, Default)]
pub struct StableCenterCache {
    centers: HashMap<Fingerprint, LatLng>,
    hits: u64,
    misses: u64,
}

impl StableCenterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.centers.clear();
    }

    /// Returns `None` only for an empty member list.
    pub fn center_for(
        &mut self,
        members: &[Arc<Point>],
        target: LatLng,
        policy: CenterPolicy,
    ) -> Option<StableCenter> {
        if members.is_empty() {
            return None;
        }
        let key = Fingerprint::of(members, policy);
        if let Some(position) = self.centers.get(&key) {
            self.hits += 1;
            return Some(StableCenter {
                position: *position,
                reused: true,
            });
        }

        let position = match policy {
            CenterPolicy::Target => target,
            CenterPolicy::NearestMember => nearest_member(members, target)?,
        };
        self.misses += 1;
        self.centers.insert(key, position);
        Some(StableCenter {
            position,
            reused: false,
        })
    }
}

/// Member position closest to `target`; ties go to the smallest id so the
/// choice does not depend on member order.
pub fn nearest_member(members: &[Arc<Point>], target: LatLng) -> Option<LatLng> {
    members
        .iter()
        .min_by(|a, b| {
            stable_total_cmp_f64(
                haversine_km(a.position, target),
                haversine_km(b.position, target),
            )
            .then_with(|| a.id.cmp(&b.id))
        })
        .map(|p| p.position)
}
