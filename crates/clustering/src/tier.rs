use serde::Serialize;

use crate::config::TierThresholds;

/// Clustering strategy, chosen purely from the zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterTier {
    Heat,
    Region,
    Individual,
}

impl ClusterTier {
    /// Lower bounds are inclusive: with defaults, 10.9 is `Heat`, 11.0 is
    /// `Region`, 14.9 is `Region`, 15.0 is `Individual`. A NaN zoom selects `Heat`.
    pub fn for_zoom(zoom: f64, thresholds: &TierThresholds) -> Self {
        if zoom >= thresholds.individual_min_zoom {
            ClusterTier::Individual
        } else if zoom >= thresholds.region_min_zoom {
            ClusterTier::Region
        } else {
            ClusterTier::Heat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterTier::Heat => "heat",
            ClusterTier::Region => "region",
            ClusterTier::Individual => "individual",
        }
    }
}

impl std::fmt::Display for ClusterTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
