use std::sync::Arc;

use foundation::GeoBounds;
use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;
use crate::error::ClusterError;
use crate::point::Point;

/// Visible map area plus the current zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: GeoBounds,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bounds: GeoBounds, zoom: f64) -> Self {
        Self { bounds, zoom }
    }

    pub fn validate(&self) -> Result<(), ClusterError> {
        if !self.zoom.is_finite() {
            return Err(ClusterError::InvalidViewport(format!(
                "zoom must be finite, got {}",
                self.zoom
            )));
        }
        if !self.bounds.is_finite() {
            return Err(ClusterError::InvalidViewport(
                "bounds must be finite".to_string(),
            ));
        }
        if self.bounds.south > self.bounds.north || self.bounds.west > self.bounds.east {
            return Err(ClusterError::InvalidViewport(format!(
                "bounds are inverted: {:?}",
                self.bounds
            )));
        }
        Ok(())
    }
}

/// Margin (fraction of span per side) for the given zoom; shrinks as zoom grows.
pub fn margin_fraction(zoom: f64, config: &ViewportConfig) -> f64 {
    if zoom < config.medium_from_zoom {
        config.wide_margin
    } else if zoom <= config.tight_above_zoom {
        config.medium_margin
    } else {
        config.tight_margin
    }
}

pub fn expanded_bounds(viewport: &Viewport, config: &ViewportConfig) -> GeoBounds {
    viewport
        .bounds
        .expanded_by_fraction(margin_fraction(viewport.zoom, config))
}

/// Indices of the points inside the margin-expanded viewport, in input order.
pub fn select_candidate_indices(
    points: &[Arc<Point>],
    viewport: &Viewport,
    config: &ViewportConfig,
) -> Vec<usize> {
    let area = expanded_bounds(viewport, config);
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| area.contains(p.position))
        .map(|(i, _)| i)
        .collect()
}

pub fn select_candidates(
    points: &[Arc<Point>],
    viewport: &Viewport,
    config: &ViewportConfig,
) -> Vec<Arc<Point>> {
    select_candidate_indices(points, viewport, config)
        .into_iter()
        .map(|i| Arc::clone(&points[i]))
        .collect()
}
