//! Sensor placement for full line-of-sight coverage of free space.
//!
//! Placements grow outward from corner seeds on a fixed eight-direction
//! lattice. Every accepted placement must respect the inset, clearance,
//! separation and connectivity rules and add enough newly covered cells.

use crate::error::PlanError;
use crate::models::{CameraPosition, Grid, Point};
use crate::rules::CoverageRules;
use crate::spatial::{disk_offsets, has_clearance, rasterize_line};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::f64::consts::SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageOutcome {
    FullyCovered,
    Partial,
    NoValidPlacement,
}

/// Result of one coverage planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub placements: Vec<CameraPosition>,
    pub fully_covered: bool,
    pub covered_cells: usize,
    pub free_cells: usize,
    pub outcome: CoverageOutcome,
}

impl CoverageReport {
    fn new(grid: &Grid, placements: Vec<CameraPosition>) -> Self {
        let covered = covered_by(grid, &placements);
        let free_cells = grid.free_count();
        let fully_covered = covered.len() == free_cells;
        let outcome = if placements.is_empty() {
            CoverageOutcome::NoValidPlacement
        } else if fully_covered {
            CoverageOutcome::FullyCovered
        } else {
            CoverageOutcome::Partial
        };
        Self {
            placements,
            fully_covered,
            covered_cells: covered.len(),
            free_cells,
            outcome,
        }
    }

    /// Only an empty placement set is an error; partial coverage is not.
    pub fn error(&self) -> Option<PlanError> {
        match self.outcome {
            CoverageOutcome::NoValidPlacement => Some(PlanError::NoValidSensorPlacement),
            _ => None,
        }
    }

    pub fn coverage_ratio(&self) -> f64 {
        if self.free_cells == 0 {
            return 1.0;
        }
        self.covered_cells as f64 / self.free_cells as f64
    }
}

/// Plan placements with range-derived default rules.
pub fn compute_coverage(grid: &Grid, sensor_range: f64) -> CoverageReport {
    compute_coverage_with_rules(grid, sensor_range, &CoverageRules::for_range(sensor_range))
}

pub fn compute_coverage_with_rules(
    grid: &Grid,
    sensor_range: f64,
    rules: &CoverageRules,
) -> CoverageReport {
    let mut seeds = corner_seeds(grid, rules.edge_inset);
    if seeds.is_empty() {
        seeds = fallback_seeds(grid);
        tracing::debug!(seeds = seeds.len(), "no corners found, using interior seeds");
    } else {
        tracing::debug!(seeds = seeds.len(), "corner seeds found");
    }

    let mut placer = Placer {
        grid,
        range: sensor_range,
        rules,
        offsets: lattice_offsets(rules.step_distance),
        placements: Vec::new(),
        covered: HashSet::new(),
    };

    // Each pass restarts from seeds and placements; stops once a pass adds nothing.
    let mut passes = 0;
    loop {
        passes += 1;
        if placer.expand(&seeds) == 0 {
            break;
        }
    }

    let placements = prune_placements(grid, placer.placements, rules);
    let report = CoverageReport::new(grid, placements);
    tracing::info!(
        placements = report.placements.len(),
        covered = report.covered_cells,
        free = report.free_cells,
        passes,
        "coverage planned"
    );
    report
}

struct Placer<'a> {
    grid: &'a Grid,
    range: f64,
    rules: &'a CoverageRules,
    offsets: [(i32, i32); 8],
    placements: Vec<CameraPosition>,
    covered: HashSet<Point>,
}

impl Placer<'_> {
    /// One breadth-first sweep. Returns the number of placements accepted.
    fn expand(&mut self, seeds: &[Point]) -> usize {
        let mut queue: VecDeque<Point> = seeds.iter().copied().collect();
        queue.extend(self.placements.iter().map(|p| p.point));
        let origins: HashSet<Point> = queue.iter().copied().collect();
        let mut seen: HashSet<Point> = HashSet::new();
        let mut accepted = 0;

        while let Some(site) = queue.pop_front() {
            if !seen.insert(site) {
                continue;
            }
            let already_placed = self.placements.iter().any(|p| p.point == site);
            let placed = !already_placed && self.try_place(site);
            if placed {
                accepted += 1;
            }
            // Seeds that fail validation still spawn candidates.
            if placed || origins.contains(&site) {
                for (dr, dc) in self.offsets {
                    let next = site.offset(dr, dc);
                    if self.grid.in_bounds(next) && !seen.contains(&next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        accepted
    }

    fn try_place(&mut self, site: Point) -> bool {
        if !within_inset(self.grid, site, self.rules.edge_inset)
            || self.grid.is_blocked(site)
            || !has_clearance(self.grid, site, self.rules.clearance_radius)
        {
            return false;
        }
        if self
            .placements
            .iter()
            .any(|p| p.point.distance(site) < self.rules.min_separation)
        {
            return false;
        }
        if !self.placements.is_empty()
            && !self
                .placements
                .iter()
                .any(|p| p.point.distance(site) <= self.rules.connectivity_radius)
        {
            return false;
        }

        let visible = visible_cells(self.grid, site, self.range);
        let fresh = visible.iter().filter(|c| !self.covered.contains(c)).count();
        if fresh < self.rules.min_new_coverage.max(1) {
            return false;
        }

        tracing::trace!(%site, fresh, "placement accepted");
        self.covered.extend(visible);
        self.placements.push(CameraPosition {
            point: site,
            range: self.range,
        });
        true
    }
}

fn lattice_offsets(step: f64) -> [(i32, i32); 8] {
    let s = step.round().max(1.0) as i32;
    let d = (step / SQRT_2).round().max(1.0) as i32;
    [
        (0, s),
        (-d, d),
        (-s, 0),
        (-d, -d),
        (0, -s),
        (d, -d),
        (s, 0),
        (d, d),
    ]
}

fn within_inset(grid: &Grid, point: Point, inset: usize) -> bool {
    let inset = inset as i64;
    let (row, col) = (i64::from(point.row), i64::from(point.col));
    row >= inset
        && col >= inset
        && row < grid.rows() as i64 - inset
        && col < grid.cols() as i64 - inset
}

/// Free cells inside the inset with a blocked vertical and a blocked
/// horizontal neighbour, row-major.
fn corner_seeds(grid: &Grid, inset: usize) -> Vec<Point> {
    grid.free_cells()
        .filter(|p| within_inset(grid, *p, inset))
        .filter(|p| {
            let vertical = grid.is_blocked(p.offset(-1, 0)) || grid.is_blocked(p.offset(1, 0));
            let horizontal = grid.is_blocked(p.offset(0, -1)) || grid.is_blocked(p.offset(0, 1));
            vertical && horizontal
        })
        .collect()
}

fn fallback_seeds(grid: &Grid) -> Vec<Point> {
    let (r1, r3) = ((grid.rows() / 4) as i32, (3 * grid.rows() / 4) as i32);
    let (c1, c3) = ((grid.cols() / 4) as i32, (3 * grid.cols() / 4) as i32);
    vec![
        Point::new(r1, c1),
        Point::new(r1, c3),
        Point::new(r3, c1),
        Point::new(r3, c3),
    ]
}

/// Keep placements chained to the first by connectivity hops and inside the inset.
fn prune_placements(
    grid: &Grid,
    placements: Vec<CameraPosition>,
    rules: &CoverageRules,
) -> Vec<CameraPosition> {
    if placements.is_empty() {
        return placements;
    }
    let mut reached = vec![false; placements.len()];
    reached[0] = true;
    let mut queue = VecDeque::from([0usize]);
    while let Some(idx) = queue.pop_front() {
        for other in 0..placements.len() {
            let hop = placements[idx].point.distance(placements[other].point);
            if !reached[other] && hop <= rules.connectivity_radius {
                reached[other] = true;
                queue.push_back(other);
            }
        }
    }

    let before = placements.len();
    let kept: Vec<CameraPosition> = placements
        .into_iter()
        .zip(reached)
        .filter(|(p, ok)| *ok && within_inset(grid, p.point, rules.edge_inset))
        .map(|(p, _)| p)
        .collect();
    if kept.len() != before {
        tracing::debug!(dropped = before - kept.len(), "pruned disconnected placements");
    }
    kept
}

/// Free cells within `range` of `origin` with no blocked cell strictly
/// between them along the digital line.
pub fn visible_cells(grid: &Grid, origin: Point, range: f64) -> Vec<Point> {
    if grid.is_blocked(origin) {
        return Vec::new();
    }
    disk_offsets(range)
        .into_iter()
        .map(|(dr, dc)| origin.offset(dr, dc))
        .filter(|target| grid.is_free(*target))
        .filter(|target| {
            let line = rasterize_line(origin, *target);
            line.len() <= 2 || line[1..line.len() - 1].iter().all(|p| grid.is_free(*p))
        })
        .collect()
}

fn covered_by(grid: &Grid, placements: &[CameraPosition]) -> HashSet<Point> {
    placements
        .iter()
        .flat_map(|p| visible_cells(grid, p.point, p.range))
        .collect()
}

/// True iff every free cell is visible from at least one placement.
pub fn is_fully_covered(grid: &Grid, placements: &[CameraPosition]) -> bool {
    covered_by(grid, placements).len() == grid.free_count()
}
