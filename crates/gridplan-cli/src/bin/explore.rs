//! Run a frontier exploration session locally and print the report as JSON.
//!
//! Movement is paced in real time unless `--instant` is given. Ctrl-C
//! cancels and prints the partial report.

use clap::Parser;
use gridplan_cli::{init_tracing, point_arg, print_json, MapArgs};
use gridplan_core::{ExplorationRules, ExplorationSession, Point};
use tokio::time;

/// Explore a grid from a seed point
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    map: MapArgs,

    /// Start position as ROW,COL
    #[arg(long, value_parser = point_arg)]
    seed: Point,

    /// Maximum scan ray length in cells
    #[arg(long, env = "GRIDPLAN_SCAN_RANGE", default_value_t = 40.0)]
    scan_range: f64,

    /// Rays mark cells scanned up to this distance
    #[arg(long, env = "GRIDPLAN_MARK_RADIUS", default_value_t = 20.0)]
    mark_radius: f64,

    /// Angular bin width for frontier detection (degrees)
    #[arg(long, env = "GRIDPLAN_BIN_SIZE_DEG", default_value_t = 45)]
    bin_size: u16,

    /// Agent speed in cells per second
    #[arg(long, env = "GRIDPLAN_SPEED_CPS", default_value_t = 20.0)]
    speed: f64,

    /// Minimum anchor distance from walls
    #[arg(long, env = "GRIDPLAN_WALL_CLEARANCE", default_value_t = 3.0)]
    wall_clearance: f64,

    /// Minimum distance between anchors
    #[arg(long, env = "GRIDPLAN_PEER_SEPARATION", default_value_t = 10.0)]
    peer_separation: f64,

    /// Run without pacing
    #[arg(long)]
    instant: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = Args::parse();
    let grid = args.map.load()?;

    let rules = ExplorationRules {
        scan_range: args.scan_range,
        mark_radius: args.mark_radius,
        bin_size_deg: args.bin_size,
        speed_cells_per_sec: args.speed,
        min_wall_clearance: args.wall_clearance,
        min_peer_separation: args.peer_separation,
        ..ExplorationRules::default()
    };
    let mut session = ExplorationSession::new(grid, &[args.seed], rules)?;

    if args.instant {
        return print_json(&session.run_to_completion());
    }

    let mut ticker = time::interval(session.rules().step_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!("Interrupted at {}", session.position());
                session.cancel();
                break;
            }
            _ = ticker.tick() => {
                if !session.tick() {
                    break;
                }
            }
        }
    }

    print_json(&session.report())
}
