//! Route and coverage planning endpoints.

use axum::{extract::State, Json};
use gridplan_core::{
    compute_coverage_with_rules, plan_route, plan_route_with_fallback, resample_path,
    shortcut_path, CoverageReport, CoverageRules, Grid, Point, RouteRules, Waypoint,
    WaypointStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Fixed seed so smoothed playback is reproducible.
const SHORTCUT_SEED: u64 = 0;

#[derive(Debug, Clone, Deserialize)]
pub struct RoutePlanRequest {
    pub grid: Grid,
    pub waypoints: Vec<Waypoint>,
    pub rules: Option<RouteRules>,
    /// Retry on the raw grid when obstacle growth blocks the route
    #[serde(default = "default_true")]
    pub fallback: bool,
    pub playback_step: Option<f64>,
    pub shortcut_iterations: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutePlanResponse {
    pub ok: bool,
    pub path: Vec<Point>,
    pub return_start_index: Option<usize>,
    pub length: f64,
    /// Visiting order as indices into the request's waypoint list
    pub order: Vec<usize>,
    pub waypoints: Vec<Waypoint>,
    pub playback: Vec<(f64, f64)>,
    /// Recovered failures, e.g. a buffered attempt that needed the fallback
    pub errors: Vec<String>,
}

/// Plan a closed route through every waypoint that has not failed.
pub async fn plan_route_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RoutePlanRequest>,
) -> Result<Json<RoutePlanResponse>, ApiError> {
    let config = state.config();
    let rules = req.rules.clone().unwrap_or_else(|| config.route_rules.clone());

    // Failed waypoints are known unreachable; route around them.
    let active: Vec<usize> = req
        .waypoints
        .iter()
        .enumerate()
        .filter(|(_, w)| w.status != WaypointStatus::Failed)
        .map(|(idx, _)| idx)
        .collect();
    let points: Vec<Point> = active.iter().map(|idx| req.waypoints[*idx].point).collect();

    let planned = if req.fallback {
        plan_route_with_fallback(&req.grid, &points, &rules)
    } else {
        plan_route(&req.grid, &points, &rules)
    };
    let plan = planned.inspect_err(|err| tracing::info!("Route planning failed: {}", err))?;
    let errors: Vec<String> = plan.fallback_from.iter().map(ToString::to_string).collect();

    let playback_source = match req.shortcut_iterations {
        Some(iterations) if iterations > 0 => {
            shortcut_path(&req.grid, plan.path.points(), iterations, SHORTCUT_SEED)
        }
        _ => plan.path.points().to_vec(),
    };
    let step = req.playback_step.unwrap_or(config.playback_step);
    let playback = resample_path(&playback_source, step);

    let order: Vec<usize> = plan.order.iter().map(|idx| active[*idx]).collect();
    let waypoints = order.iter().map(|idx| req.waypoints[*idx]).collect();
    tracing::info!(
        waypoints = points.len(),
        points = plan.path.len(),
        length = plan.path.length(),
        "Route planned"
    );

    Ok(Json(RoutePlanResponse {
        ok: true,
        return_start_index: plan.path.return_start_index(),
        length: plan.path.length(),
        path: plan.path.into_points(),
        order,
        waypoints,
        playback,
        errors,
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoveragePlanRequest {
    pub grid: Grid,
    pub sensor_range: f64,
    pub rules: Option<CoverageRules>,
}

/// Place sensors. Partial coverage and an empty placement set are both
/// reported through `outcome`, not as errors.
pub async fn plan_coverage_handler(Json(req): Json<CoveragePlanRequest>) -> Json<CoverageReport> {
    let rules = req
        .rules
        .unwrap_or_else(|| CoverageRules::for_range(req.sensor_range));
    let report = compute_coverage_with_rules(&req.grid, req.sensor_range, &rules);
    tracing::info!(
        placements = report.placements.len(),
        outcome = ?report.outcome,
        "Coverage planned"
    );
    Json(report)
}
