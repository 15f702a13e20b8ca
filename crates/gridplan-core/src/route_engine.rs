//! Single-pair grid search.
//!
//! A straight line is used whenever line of sight holds; otherwise an
//! 8-connected A* with octile heuristic finds a length-optimal path.

use crate::error::PlanError;
use crate::models::{Grid, Point};
use crate::spatial::{has_line_of_sight, octile_distance, rasterize_line};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::SQRT_2;

/// Neighbour moves as (drow, dcol, cost). Order is part of the determinism contract.
const MOVES: [(i32, i32, f64); 8] = [
    (1, 0, 1.0),
    (-1, 0, 1.0),
    (0, 1, 1.0),
    (0, -1, 1.0),
    (1, 1, SQRT_2),
    (1, -1, SQRT_2),
    (-1, 1, SQRT_2),
    (-1, -1, SQRT_2),
];

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f_score: FloatOrd,
    g_score: f64,
    /// Enqueue counter; earlier entries win ties on f.
    seq: u64,
    point: Point,
    parent: Option<Point>,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_score == other.f_score && self.seq == other.seq
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Find a connecting path from `start` to `goal`, both included.
pub fn find_segment(grid: &Grid, start: Point, goal: Point) -> Result<Vec<Point>, PlanError> {
    if grid.is_blocked(start) {
        return Err(PlanError::BlockedEndpoint(start));
    }
    if grid.is_blocked(goal) {
        return Err(PlanError::BlockedEndpoint(goal));
    }

    if has_line_of_sight(grid, start, goal) {
        let line = rasterize_line(start, goal);
        // Sampled visibility and Bresenham cells can disagree near corners.
        if line.iter().all(|cell| grid.is_free(*cell)) {
            tracing::trace!(%start, %goal, "line of sight, using straight segment");
            return Ok(line);
        }
    }

    tracing::trace!(%start, %goal, "no line of sight, running grid search");
    astar(grid, start, goal).ok_or(PlanError::NoPathFound { start, goal })
}

fn astar(grid: &Grid, start: Point, goal: Point) -> Option<Vec<Point>> {
    let mut open_set: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();
    let mut closed_set: HashSet<Point> = HashSet::new();
    let mut best_g: HashMap<Point, f64> = HashMap::new();
    let mut came_from: HashMap<Point, Option<Point>> = HashMap::new();
    let mut seq = 0u64;

    open_set.push(Reverse(OpenNode {
        f_score: FloatOrd(octile_distance(start, goal)),
        g_score: 0.0,
        seq,
        point: start,
        parent: None,
    }));
    best_g.insert(start, 0.0);

    while let Some(Reverse(current)) = open_set.pop() {
        if !closed_set.insert(current.point) {
            continue;
        }
        came_from.insert(current.point, current.parent);

        if current.point == goal {
            return Some(reconstruct(&came_from, goal));
        }

        for (drow, dcol, cost) in MOVES {
            let next = current.point.offset(drow, dcol);
            if grid.is_blocked(next) || closed_set.contains(&next) {
                continue;
            }
            let tentative_g = current.g_score + cost;
            if tentative_g < best_g.get(&next).copied().unwrap_or(f64::INFINITY) {
                best_g.insert(next, tentative_g);
                seq += 1;
                open_set.push(Reverse(OpenNode {
                    f_score: FloatOrd(tentative_g + octile_distance(next, goal)),
                    g_score: tentative_g,
                    seq,
                    point: next,
                    parent: Some(current.point),
                }));
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Point, Option<Point>>, goal: Point) -> Vec<Point> {
    let mut path = vec![goal];
    let mut cursor = came_from.get(&goal).copied().flatten();
    while let Some(point) = cursor {
        path.push(point);
        cursor = came_from.get(&point).copied().flatten();
    }
    path.reverse();
    path
}

/// Randomised shortcut smoothing: repeatedly pick two points at least two
/// apart and splice out everything between them when line of sight holds.
///
/// The RNG is seeded so the same input always yields the same output.
/// Spliced paths are no longer cell-connected; they are polylines.
pub fn shortcut_path(grid: &Grid, path: &[Point], iterations: usize, seed: u64) -> Vec<Point> {
    let mut points = path.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..iterations {
        if points.len() <= 2 {
            break;
        }
        let start_idx = rng.random_range(0..=points.len() - 3);
        let end_idx = rng.random_range(start_idx + 2..=points.len() - 1);
        if has_line_of_sight(grid, points[start_idx], points[end_idx]) {
            points.drain(start_idx + 1..end_idx);
        }
    }
    points
}
