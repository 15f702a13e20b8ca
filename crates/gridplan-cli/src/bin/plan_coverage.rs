//! Place range-limited sensors to cover a grid and print the report as JSON.

use clap::Parser;
use gridplan_cli::{init_tracing, print_json, MapArgs};
use gridplan_core::{compute_coverage_with_rules, CoverageRules};

/// Plan sensor placements for line-of-sight coverage
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    map: MapArgs,

    /// Sensor range in cells
    #[arg(long, env = "GRIDPLAN_SENSOR_RANGE", default_value_t = 30.0)]
    range: f64,

    /// Minimum distance from every grid edge
    #[arg(long)]
    edge_inset: Option<usize>,

    /// Minimum distance from any blocked cell
    #[arg(long)]
    clearance: Option<f64>,

    /// Lattice step between candidate sites
    #[arg(long)]
    step: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = Args::parse();
    let grid = args.map.load()?;

    let defaults = CoverageRules::for_range(args.range);
    let rules = CoverageRules {
        edge_inset: args.edge_inset.unwrap_or(defaults.edge_inset),
        clearance_radius: args.clearance.unwrap_or(defaults.clearance_radius),
        step_distance: args.step.unwrap_or(defaults.step_distance),
        ..defaults
    };

    let report = compute_coverage_with_rules(&grid, args.range, &rules);
    if let Some(err) = report.error() {
        eprintln!("warning: {}", err);
    }
    print_json(&report)
}
