//! Error types for planning operations.

use crate::models::Point;

/// Failures surfaced by the planners.
///
/// Route planning is atomic: any of the routing variants means no path was
/// produced at all, which is distinct from a successful (never empty) path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("need at least 2 waypoints, got {count}")]
    InsufficientWaypoints { count: usize },

    #[error("endpoint {0} is blocked or outside the grid")]
    BlockedEndpoint(Point),

    #[error("no path found from {start} to {goal}")]
    NoPathFound { start: Point, goal: Point },

    /// The closing leg from the last waypoint back to the first failed.
    #[error("return leg from {from} to {to} is unreachable")]
    RouteIncomplete { from: Point, to: Point },

    /// Some waypoint pair has no connecting path.
    #[error("distance matrix incomplete: {from} cannot reach {to}")]
    DistanceMatrixIncomplete { from: Point, to: Point },

    #[error("no valid sensor placement found")]
    NoValidSensorPlacement,

    #[error("exploration needs exactly one seed point, got {count}")]
    InvalidExplorationSeed { count: usize },

    /// Candidate anchor and all its neighbours failed validation. Never fatal.
    #[error("anchor near {0} could not be placed")]
    AnchorUnplaceable(Point),
}

impl PlanError {
    /// Stable machine-readable kind, used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::InsufficientWaypoints { .. } => "insufficient_waypoints",
            PlanError::BlockedEndpoint(_) => "blocked_endpoint",
            PlanError::NoPathFound { .. } => "no_path_found",
            PlanError::RouteIncomplete { .. } => "route_incomplete",
            PlanError::DistanceMatrixIncomplete { .. } => "distance_matrix_incomplete",
            PlanError::NoValidSensorPlacement => "no_valid_sensor_placement",
            PlanError::InvalidExplorationSeed { .. } => "invalid_exploration_seed",
            PlanError::AnchorUnplaceable(_) => "anchor_unplaceable",
        }
    }
}

/// Malformed grid input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("unexpected character {found:?} at line {line}, column {col}")]
    InvalidCell { line: usize, col: usize, found: char },
}
