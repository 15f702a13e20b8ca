//! Plan a closed route through waypoints on a grid and print it as JSON.

use clap::{Parser, ValueEnum};
use gridplan_cli::{init_tracing, point_arg, print_json, MapArgs};
use gridplan_core::{
    plan_route_with_fallback, resample_path, shortcut_path, OrderingStrategy, Point, RouteRules,
};
use serde::Serialize;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Strategy {
    NearestNeighbor,
    DistanceMatrix,
}

impl From<Strategy> for OrderingStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::NearestNeighbor => OrderingStrategy::NearestNeighbor,
            Strategy::DistanceMatrix => OrderingStrategy::DistanceMatrix,
        }
    }
}

/// Plan a closed route through waypoints
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    map: MapArgs,

    /// Waypoint as ROW,COL (repeat, at least twice)
    #[arg(long = "waypoint", value_parser = point_arg, required = true)]
    waypoints: Vec<Point>,

    /// Keep the given waypoint order
    #[arg(long)]
    no_optimize: bool,

    /// Ordering strategy
    #[arg(long, value_enum, default_value = "distance-matrix")]
    strategy: Strategy,

    /// Manhattan wall buffer in cells
    #[arg(long, env = "GRIDPLAN_BUFFER_RADIUS")]
    buffer_radius: Option<usize>,

    /// Disk inflation for the agent footprint
    #[arg(long)]
    footprint_radius: Option<f64>,

    /// Random shortcut passes applied to the playback path
    #[arg(long, default_value_t = 0)]
    shortcut_iterations: usize,

    /// Playback resampling step in cells
    #[arg(long, default_value_t = 0.6)]
    playback_step: f64,
}

#[derive(Serialize)]
struct Output {
    path: Vec<Point>,
    return_start_index: Option<usize>,
    length: f64,
    order: Vec<usize>,
    playback: Vec<(f64, f64)>,
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = Args::parse();
    let grid = args.map.load()?;

    let rules = RouteRules {
        optimize_order: !args.no_optimize,
        strategy: args.strategy.into(),
        buffer_radius: args.buffer_radius,
        footprint_radius: args.footprint_radius,
    };
    let plan = plan_route_with_fallback(&grid, &args.waypoints, &rules)?;

    let smoothed = if args.shortcut_iterations > 0 {
        shortcut_path(&grid, plan.path.points(), args.shortcut_iterations, 0)
    } else {
        plan.path.points().to_vec()
    };

    print_json(&Output {
        return_start_index: plan.path.return_start_index(),
        length: plan.path.length(),
        playback: resample_path(&smoothed, args.playback_step),
        path: plan.path.into_points(),
        order: plan.order,
    })
}
