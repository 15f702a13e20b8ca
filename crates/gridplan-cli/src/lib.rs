//! Gridplan CLI - shared helpers for the planning binaries.
//!
//! - plan_route: closed route through waypoints
//! - plan_coverage: sensor placement
//! - explore: frontier exploration session

use anyhow::{bail, Context, Result};
use clap::Args;
use gridplan_core::{Grid, Point};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Map source shared by every binary.
#[derive(Args, Debug, Clone)]
pub struct MapArgs {
    /// ASCII map file (`#` blocked, `.` free)
    #[arg(long, env = "GRIDPLAN_MAP", conflicts_with = "default_map")]
    pub map: Option<PathBuf>,

    /// Use the built-in walled room of this size instead of a file
    #[arg(long, default_value_t = 224)]
    pub default_map: usize,
}

impl MapArgs {
    pub fn load(&self) -> Result<Grid> {
        match &self.map {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading map {}", path.display()))?;
                let grid = Grid::from_ascii(&text)
                    .with_context(|| format!("parsing map {}", path.display()))?;
                tracing::info!(rows = grid.rows(), cols = grid.cols(), "Loaded map");
                Ok(grid)
            }
            None => Ok(Grid::walled_room(self.default_map, self.default_map)),
        }
    }
}

/// Parse `row,col` into a point.
pub fn parse_point(raw: &str) -> Result<Point> {
    let Some((row, col)) = raw.split_once(',') else {
        bail!("expected ROW,COL, got {raw:?}");
    };
    let row = row.trim().parse().with_context(|| format!("bad row in {raw:?}"))?;
    let col = col.trim().parse().with_context(|| format!("bad column in {raw:?}"))?;
    Ok(Point::new(row, col))
}

/// clap value parser wrapper around [`parse_point`].
pub fn point_arg(raw: &str) -> std::result::Result<Point, String> {
    parse_point(raw).map_err(|e| format!("{e:#}"))
}

/// Log to stderr so stdout stays pure JSON.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gridplan_core=info".parse()?),
        )
        .init();
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
