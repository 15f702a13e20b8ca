pub mod coverage;
pub mod error;
pub mod exploration;
pub mod models;
pub mod route_engine;
pub mod routing;
pub mod rules;
pub mod spatial;

pub use coverage::{
    compute_coverage, compute_coverage_with_rules, is_fully_covered, visible_cells, CoverageOutcome,
    CoverageReport,
};
pub use error::{GridError, PlanError};
pub use exploration::{
    ExplorationPhase, ExplorationReport, ExplorationSession, ExplorationSnapshot, SCAN_ANGLE_STEP,
};
pub use models::{
    CameraPosition, DistanceMatrix, Grid, LegKind, Path, PathLeg, Point, ScanResult, Waypoint,
    WaypointStatus,
};
pub use route_engine::{find_segment, shortcut_path};
pub use routing::{
    distance_matrix, exact_order, heuristic_order, nearest_neighbor_order, order_waypoints,
    plan_route, plan_route_with_fallback, RoutePlan, EXACT_ORDERING_MAX_WAYPOINTS,
};
pub use rules::{CoverageRules, ExplorationRules, OrderingStrategy, RouteRules};
pub use spatial::{
    buffer_obstacles, has_line_of_sight, inflate_obstacles, octile_distance, path_length,
    rasterize_line, resample_path,
};
