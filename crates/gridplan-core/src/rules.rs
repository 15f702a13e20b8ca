//! Tunable parameters for the planners.
//!
//! Every struct deserializes with `#[serde(default)]`, so callers may send a
//! partial override and inherit the rest.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sensor range the coverage defaults are calibrated against.
pub const REFERENCE_SENSOR_RANGE: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingStrategy {
    /// Greedy on straight-line octile estimates. Never fails.
    NearestNeighbor,
    /// True path costs; exact for small sets, greedy on true costs otherwise.
    #[default]
    DistanceMatrix,
}

/// Configuration for multi-waypoint routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteRules {
    /// Reorder waypoints before stitching (only with 3+ waypoints)
    pub optimize_order: bool,
    pub strategy: OrderingStrategy,
    /// Manhattan wall buffer applied to the stitching grid
    pub buffer_radius: Option<usize>,
    /// Disk inflation for the agent footprint, applied before buffering
    pub footprint_radius: Option<f64>,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            optimize_order: true,
            strategy: OrderingStrategy::DistanceMatrix,
            buffer_radius: None,
            footprint_radius: None,
        }
    }
}

impl RouteRules {
    pub fn is_obstacle_growing(&self) -> bool {
        self.buffer_radius.is_some_and(|r| r > 0) || self.footprint_radius.is_some_and(|r| r > 0.0)
    }

    /// Same rules on the raw grid.
    pub fn without_obstacle_growth(&self) -> Self {
        Self {
            buffer_radius: None,
            footprint_radius: None,
            ..self.clone()
        }
    }
}

/// Configuration for sensor placement.
///
/// The edge inset and clearance defaults were tuned on a 224×224 room with a
/// 10-cell border wall; they do not scale with the grid and should be
/// overridden for much smaller or larger maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageRules {
    /// Placements must sit at least this many cells from every grid edge
    pub edge_inset: usize,
    /// No blocked cell may lie within this radius of a placement
    pub clearance_radius: f64,
    /// Distance between a site and the candidates it spawns
    pub step_distance: f64,
    /// Minimum distance between any two placements
    pub min_separation: f64,
    /// A new placement must be within this distance of an existing one
    pub connectivity_radius: f64,
    /// Candidates covering fewer new cells than this are skipped
    pub min_new_coverage: usize,
}

impl CoverageRules {
    /// Range-relative defaults for a given sensor range.
    pub fn for_range(sensor_range: f64) -> Self {
        let range = sensor_range.max(1.0);
        Self {
            edge_inset: 10,
            clearance_radius: 2.0,
            step_distance: (range * 0.75).max(1.0),
            min_separation: range * 0.4,
            connectivity_radius: range * 1.5,
            min_new_coverage: 5,
        }
    }
}

impl Default for CoverageRules {
    fn default() -> Self {
        Self::for_range(REFERENCE_SENSOR_RANGE)
    }
}

/// Configuration for the frontier exploration controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationRules {
    /// Maximum ray length in cells
    pub scan_range: f64,
    /// Raycast step length in cells
    pub ray_step: f64,
    /// Cells along a ray closer than this are marked scanned
    pub mark_radius: f64,
    /// Width of an angular bin for frontier detection (degrees)
    pub bin_size_deg: u16,
    /// A bin whose longest ray exceeds this becomes an anchor candidate
    pub frontier_threshold: f64,
    /// Distance from the scan origin at which anchors are proposed
    pub anchor_distance: f64,
    /// No blocked cell may lie within this radius of an anchor
    pub min_wall_clearance: f64,
    /// Anchors must be at least this far from every existing waypoint
    pub min_peer_separation: f64,
    /// Simulated agent speed in cells per second
    pub speed_cells_per_sec: f64,
}

impl Default for ExplorationRules {
    fn default() -> Self {
        Self {
            scan_range: 40.0,
            ray_step: 0.5,
            mark_radius: 20.0,
            bin_size_deg: 45,
            frontier_threshold: 30.0,
            anchor_distance: 15.0,
            min_wall_clearance: 3.0,
            min_peer_separation: 10.0,
            speed_cells_per_sec: 20.0,
        }
    }
}

/// Shortest pacing between movement steps; timers reject a zero period.
pub const MIN_STEP_INTERVAL: Duration = Duration::from_millis(1);

impl ExplorationRules {
    /// Time for the agent to advance one cell, never below [`MIN_STEP_INTERVAL`].
    pub fn step_interval(&self) -> Duration {
        let speed = self.speed_cells_per_sec.max(0.01);
        Duration::from_secs_f64(1.0 / speed).max(MIN_STEP_INTERVAL)
    }

    /// Bin width clamped to a usable divisor range.
    pub fn effective_bin_size(&self) -> u16 {
        self.bin_size_deg.clamp(10, 360)
    }
}
