//! Frontier exploration with depth-first anchor traversal.
//!
//! The session is a plain value: every phase function mutates it in place and
//! `tick` performs one schedulable unit of work, so the same code runs under a
//! real timer, a paused test clock, or a tight synchronous loop.

use crate::error::PlanError;
use crate::models::{Grid, Point, ScanResult, Waypoint, WaypointStatus};
use crate::route_engine::find_segment;
use crate::rules::ExplorationRules;
use crate::spatial::{has_clearance, heading_vector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Angular spacing between scan rays, degrees.
pub const SCAN_ANGLE_STEP: u16 = 10;

/// Probe order around an anchor that failed validation.
const NEIGHBOR_PROBES: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ExplorationPhase {
    /// Cast rays from the current position and propose anchors
    Scan,
    /// Pop the stack until a pending waypoint is reachable
    Select,
    /// Stepping along a path toward waypoint `target`
    Moving {
        target: usize,
        path: Vec<Point>,
        step: usize,
    },
    Complete,
    Cancelled,
}

impl ExplorationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExplorationPhase::Complete | ExplorationPhase::Cancelled)
    }

    /// Phase name for logging and snapshots
    pub fn name(&self) -> &'static str {
        match self {
            ExplorationPhase::Scan => "scan",
            ExplorationPhase::Select => "select",
            ExplorationPhase::Moving { .. } => "moving",
            ExplorationPhase::Complete => "complete",
            ExplorationPhase::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time view of a session for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSnapshot {
    pub position: Point,
    pub phase: String,
    pub running: bool,
    pub target: Option<Point>,
    pub scanned: Vec<Point>,
    pub rays: Vec<(f64, f64)>,
    pub waypoints: Vec<Waypoint>,
    pub failed_anchors: Vec<Point>,
    pub ticks: u64,
}

/// Final tally of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub scanned_cells: usize,
    pub visited: usize,
    pub failed_anchors: Vec<Point>,
    pub ticks: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct ExplorationSession {
    grid: Grid,
    rules: ExplorationRules,
    position: Point,
    scanned: HashSet<Point>,
    waypoints: Vec<Waypoint>,
    /// Waypoint indices; the top is processed next
    stack: Vec<usize>,
    failed_anchors: Vec<Point>,
    running: bool,
    phase: ExplorationPhase,
    last_scan: Option<ScanResult>,
    ticks: u64,
}

impl ExplorationSession {
    /// Start a session from exactly one seed, which becomes visited waypoint 0.
    pub fn new(grid: Grid, seeds: &[Point], rules: ExplorationRules) -> Result<Self, PlanError> {
        let [seed] = seeds else {
            return Err(PlanError::InvalidExplorationSeed { count: seeds.len() });
        };
        let seed = *seed;
        if grid.is_blocked(seed) {
            return Err(PlanError::BlockedEndpoint(seed));
        }

        let mut origin = Waypoint::new(seed);
        origin.mark_visited();
        tracing::debug!(%seed, "exploration session created");

        Ok(Self {
            grid,
            rules,
            position: seed,
            scanned: HashSet::new(),
            waypoints: vec![origin],
            stack: Vec::new(),
            failed_anchors: Vec::new(),
            running: true,
            phase: ExplorationPhase::Scan,
            last_scan: None,
            ticks: 0,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn rules(&self) -> &ExplorationRules {
        &self.rules
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn phase(&self) -> &ExplorationPhase {
        &self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn scanned(&self) -> &HashSet<Point> {
        &self.scanned
    }

    pub fn failed_anchors(&self) -> &[Point] {
        &self.failed_anchors
    }

    pub fn last_scan(&self) -> Option<&ScanResult> {
        self.last_scan.as_ref()
    }

    /// Perform one unit of work. Returns false once the session has stopped.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.ticks += 1;
        match self.phase {
            ExplorationPhase::Scan => {
                let scan = self.scan();
                let accepted = self.generate_anchors(&scan);
                tracing::debug!(
                    position = %self.position,
                    anchors = accepted.len(),
                    scanned = self.scanned.len(),
                    "scan complete"
                );
                self.last_scan = Some(scan);
                self.phase = ExplorationPhase::Select;
            }
            ExplorationPhase::Select => {
                self.select_next_target();
            }
            ExplorationPhase::Moving { .. } => {
                self.advance_step();
            }
            ExplorationPhase::Complete | ExplorationPhase::Cancelled => {
                self.running = false;
            }
        }
        self.running
    }

    /// Stop at the current position. An in-flight target stays pending.
    pub fn cancel(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::info!(position = %self.position, ticks = self.ticks, "exploration cancelled");
        self.running = false;
        self.phase = ExplorationPhase::Cancelled;
    }

    /// Drive ticks synchronously until the session stops.
    pub fn run_to_completion(&mut self) -> ExplorationReport {
        while self.tick() {}
        self.report()
    }

    /// Cast one ray per `SCAN_ANGLE_STEP` degrees and mark cells near the agent as scanned.
    pub fn scan(&mut self) -> ScanResult {
        let origin = self.position;
        let range = self.rules.scan_range.max(0.0);
        let step = self.rules.ray_step.max(0.05);
        let mut distances = BTreeMap::new();
        self.scanned.insert(origin);

        for angle in (0..360).step_by(SCAN_ANGLE_STEP as usize) {
            let (drow, dcol) = heading_vector(f64::from(angle));
            let mut hit = range;
            let mut k = 1u32;
            loop {
                let t = f64::from(k) * step;
                if t > range {
                    break;
                }
                let cell = Point::new(
                    (origin.row as f64 + drow * t).round() as i32,
                    (origin.col as f64 + dcol * t).round() as i32,
                );
                if self.grid.is_blocked(cell) {
                    hit = t;
                    break;
                }
                if t <= self.rules.mark_radius {
                    self.scanned.insert(cell);
                }
                k += 1;
            }
            distances.insert(angle, hit);
        }

        ScanResult {
            origin,
            range,
            distances,
        }
    }

    /// Propose one anchor per angular bin whose longest ray passes the frontier
    /// threshold, and push the accepted ones with the nearest on top.
    pub fn generate_anchors(&mut self, scan: &ScanResult) -> Vec<Point> {
        let bin = self.rules.effective_bin_size();
        let mut accepted: Vec<usize> = Vec::new();

        for start in (0..360u16).step_by(bin as usize) {
            let end = (start + bin).min(360);
            let longest = scan
                .distances
                .range(start..end)
                .map(|(_, d)| *d)
                .fold(f64::NEG_INFINITY, f64::max);
            if longest <= self.rules.frontier_threshold {
                continue;
            }

            let bisector = f64::from(start) + f64::from(end - start) / 2.0;
            let (drow, dcol) = heading_vector(bisector);
            let candidate = Point::new(
                (scan.origin.row as f64 + drow * self.rules.anchor_distance).round() as i32,
                (scan.origin.col as f64 + dcol * self.rules.anchor_distance).round() as i32,
            );
            match self.place_anchor(candidate) {
                Ok(point) => {
                    self.waypoints.push(Waypoint::new(point));
                    accepted.push(self.waypoints.len() - 1);
                }
                Err(err) => tracing::debug!(bin = start, "{}", err),
            }
        }

        // Stable sort keeps generation order among equal distances.
        let position = self.position;
        let waypoints = &self.waypoints;
        accepted.sort_by(|a, b| {
            let da = waypoints[*a].point.distance(position);
            let db = waypoints[*b].point.distance(position);
            db.total_cmp(&da)
        });
        self.stack.extend(accepted.iter().copied());
        accepted.iter().map(|idx| self.waypoints[*idx].point).collect()
    }

    fn place_anchor(&self, candidate: Point) -> Result<Point, PlanError> {
        if self.is_valid_anchor(candidate) {
            return Ok(candidate);
        }
        NEIGHBOR_PROBES
            .iter()
            .map(|(dr, dc)| candidate.offset(*dr, *dc))
            .find(|p| self.is_valid_anchor(*p))
            .ok_or(PlanError::AnchorUnplaceable(candidate))
    }

    fn is_valid_anchor(&self, point: Point) -> bool {
        // Distinct points at minimum, so anchors can never repeat.
        let separation = self.rules.min_peer_separation.max(1.0);
        self.grid.is_free(point)
            && has_clearance(&self.grid, point, self.rules.min_wall_clearance)
            && self
                .waypoints
                .iter()
                .all(|w| w.point.distance(point) >= separation)
    }

    /// Pop until a pending waypoint has a path. Completes the session when the stack runs dry.
    pub fn select_next_target(&mut self) -> Option<usize> {
        while let Some(idx) = self.stack.pop() {
            if self.waypoints[idx].status != WaypointStatus::Pending {
                continue;
            }
            let target = self.waypoints[idx].point;
            match find_segment(&self.grid, self.position, target) {
                Ok(path) if path.len() > 1 => {
                    tracing::debug!(%target, steps = path.len() - 1, "moving to anchor");
                    self.phase = ExplorationPhase::Moving {
                        target: idx,
                        path,
                        step: 0,
                    };
                    return Some(idx);
                }
                Ok(_) => {
                    self.waypoints[idx].mark_visited();
                    self.phase = ExplorationPhase::Scan;
                    return Some(idx);
                }
                Err(err) => {
                    tracing::warn!(%target, "anchor unreachable: {}", err);
                    self.waypoints[idx].mark_failed();
                    self.failed_anchors.push(target);
                }
            }
        }

        self.running = false;
        self.phase = ExplorationPhase::Complete;
        tracing::info!(
            scanned = self.scanned.len(),
            failed = self.failed_anchors.len(),
            ticks = self.ticks,
            "exploration complete"
        );
        None
    }

    /// Move one cell along the current path; on arrival mark the target visited.
    pub fn advance_step(&mut self) -> bool {
        let ExplorationPhase::Moving { target, path, step } = &mut self.phase else {
            return false;
        };
        if *step + 1 < path.len() {
            *step += 1;
            self.position = path[*step];
        }
        if *step + 1 >= path.len() {
            let target = *target;
            self.waypoints[target].mark_visited();
            self.phase = ExplorationPhase::Scan;
        }
        true
    }

    pub fn snapshot(&self) -> ExplorationSnapshot {
        let mut scanned: Vec<Point> = self.scanned.iter().copied().collect();
        scanned.sort();
        let target = match &self.phase {
            ExplorationPhase::Moving { target, .. } => Some(self.waypoints[*target].point),
            _ => None,
        };
        ExplorationSnapshot {
            position: self.position,
            phase: self.phase.name().to_string(),
            running: self.running,
            target,
            scanned,
            rays: self
                .last_scan
                .as_ref()
                .map(ScanResult::ray_endpoints)
                .unwrap_or_default(),
            waypoints: self.waypoints.clone(),
            failed_anchors: self.failed_anchors.clone(),
            ticks: self.ticks,
        }
    }

    pub fn report(&self) -> ExplorationReport {
        ExplorationReport {
            scanned_cells: self.scanned.len(),
            visited: self
                .waypoints
                .iter()
                .filter(|w| w.status == WaypointStatus::Visited)
                .count(),
            failed_anchors: self.failed_anchors.clone(),
            ticks: self.ticks,
            cancelled: self.phase == ExplorationPhase::Cancelled,
        }
    }
}
