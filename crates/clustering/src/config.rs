use std::collections::BTreeMap;

use runtime::DEFAULT_DEBOUNCE_MS;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Engine tuning. Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub tiers: TierThresholds,
    pub viewport: ViewportConfig,
    pub heat: HeatConfig,
    pub overlap: OverlapConfig,
    pub scheduler: SchedulerConfig,
    pub hit_test: HitTestConfig,
    /// Change notifications kept for inspection by a session.
    pub event_log_len: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tiers: TierThresholds::default(),
            viewport: ViewportConfig::default(),
            heat: HeatConfig::default(),
            overlap: OverlapConfig::default(),
            scheduler: SchedulerConfig::default(),
            hit_test: HitTestConfig::default(),
            event_log_len: 32,
        }
    }
}

impl ClusterConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ClusterError> {
        let config: ClusterConfig =
            serde_json::from_str(payload).map_err(|e| ClusterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClusterError> {
        let t = &self.tiers;
        if !(t.region_min_zoom < t.individual_min_zoom) {
            return Err(ClusterError::Config(format!(
                "tiers.region_min_zoom ({}) must be below tiers.individual_min_zoom ({})",
                t.region_min_zoom, t.individual_min_zoom
            )));
        }
        let v = &self.viewport;
        if !(v.medium_from_zoom <= v.tight_above_zoom) {
            return Err(ClusterError::Config(
                "viewport.medium_from_zoom must not exceed viewport.tight_above_zoom".to_string(),
            ));
        }
        for (name, value) in [
            ("viewport.wide_margin", v.wide_margin),
            ("viewport.medium_margin", v.medium_margin),
            ("viewport.tight_margin", v.tight_margin),
        ] {
            if !(value >= 0.0) {
                return Err(ClusterError::Config(format!("{name} must be >= 0")));
            }
        }
        let h = &self.heat;
        for (name, value) in [
            ("heat.popular_radius_km", h.popular_radius_km),
            ("heat.regular_radius_factor", h.regular_radius_factor),
            ("overlap.grid_deg", self.overlap.grid_deg),
            ("overlap.spiral_step_deg", self.overlap.spiral_step_deg),
            ("hit_test.radius_px", self.hit_test.radius_px),
        ] {
            if !(value > 0.0) {
                return Err(ClusterError::Config(format!("{name} must be > 0")));
            }
        }
        if !(0.0..=1.0).contains(&h.popularity_tolerance) {
            return Err(ClusterError::Config(
                "heat.popularity_tolerance must be within [0, 1]".to_string(),
            ));
        }
        if h.min_regular_cluster_size < 2 {
            return Err(ClusterError::Config(
                "heat.min_regular_cluster_size must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Zoom levels where the clustering tier changes (inclusive lower bounds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub region_min_zoom: f64,
    pub individual_min_zoom: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            region_min_zoom: 11.0,
            individual_min_zoom: 15.0,
        }
    }
}

/// Over-selection margins, as a fraction of the visible span added on every side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Below `medium_from_zoom`.
    pub wide_margin: f64,
    /// From `medium_from_zoom` up to and including `tight_above_zoom`.
    pub medium_margin: f64,
    /// Above `tight_above_zoom`.
    pub tight_margin: f64,
    pub medium_from_zoom: f64,
    pub tight_above_zoom: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            wide_margin: 0.5,
            medium_margin: 0.25,
            tight_margin: 0.1,
            medium_from_zoom: 12.0,
            tight_above_zoom: 14.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    /// Points with a heat weight strictly above this are "popular".
    pub popular_threshold: f64,
    /// Popular-pass merge radius at `reference_zoom`; doubles per zoom level out.
    pub popular_radius_km: f64,
    pub reference_zoom: f64,
    /// Maximum relative weight difference `|a - b| / max(a, b)` for a popular merge.
    pub popularity_tolerance: f64,
    /// Regular-pass radius as a multiple of the popular radius.
    pub regular_radius_factor: f64,
    pub min_regular_cluster_size: usize,
    /// Extra per-attribute weights added to a point's popularity.
    pub attribute_weights: BTreeMap<String, f64>,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            popular_threshold: 50.0,
            popular_radius_km: 1.5,
            reference_zoom: 10.0,
            popularity_tolerance: 0.5,
            regular_radius_factor: 2.0,
            min_regular_cluster_size: 2,
            attribute_weights: BTreeMap::new(),
        }
    }
}

impl HeatConfig {
    pub fn popular_radius_km_at(&self, zoom: f64) -> f64 {
        self.popular_radius_km * 2f64.powf(self.reference_zoom - zoom)
    }

    pub fn regular_radius_km_at(&self, zoom: f64) -> f64 {
        self.popular_radius_km_at(zoom) * self.regular_radius_factor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    /// Edge of the grid cell that decides whether two points collide (~33 m).
    pub grid_deg: f64,
    /// Spiral distance added per collision.
    pub spiral_step_deg: f64,
    pub golden_angle_deg: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            grid_deg: 0.0003,
            spiral_step_deg: 0.00012,
            golden_angle_deg: 137.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub debounce_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitTestConfig {
    /// Marker hit radius in screen pixels.
    pub radius_px: f64,
}

impl Default for HitTestConfig {
    fn default() -> Self {
        Self { radius_px: 24.0 }
    }
}
