//! Core data models for the planning engine.

use crate::error::GridError;
use crate::spatial::heading_vector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const ROOM_BORDER_CELLS: usize = 10;
const ROOM_WALL_CELLS: usize = 6;
const ROOM_MIN_DOOR_CELLS: usize = 6;

/// Integer grid coordinate. Row grows downwards, column grows to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub row: i32,
    pub col: i32,
}

impl Point {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub const fn offset(self, drow: i32, dcol: i32) -> Self {
        Self {
            row: self.row + drow,
            col: self.col + dcol,
        }
    }

    /// Straight-line distance in cells.
    pub fn distance(self, other: Point) -> f64 {
        let dr = f64::from(other.row) - f64::from(self.row);
        let dc = f64::from(other.col) - f64::from(self.col);
        dr.hypot(dc)
    }
}

impl From<(i32, i32)> for Point {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Row-major occupancy grid. `true` marks a blocked cell.
///
/// Serialized as nested rows of booleans, the shape the editor layer hands in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<bool>>", into = "Vec<Vec<bool>>")]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// Create an all-free grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![false; rows * cols],
        }
    }

    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, GridError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(GridError::RaggedRow {
                    row: idx,
                    found: row.len(),
                    expected: cols,
                });
            }
            cells.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            cells,
        })
    }

    /// Parse an ASCII sketch: `#` is blocked, `.` or space is free.
    /// Blank lines are ignored.
    pub fn from_ascii(text: &str) -> Result<Self, GridError> {
        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let mut row = Vec::with_capacity(line.len());
            for (col, ch) in line.chars().enumerate() {
                match ch {
                    '#' => row.push(true),
                    '.' | ' ' => row.push(false),
                    other => {
                        return Err(GridError::InvalidCell {
                            line: line_no + 1,
                            col,
                            found: other,
                        })
                    }
                }
            }
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// The default editor canvas: a bordered room split by a vertical wall
    /// with a single door in the middle.
    pub fn walled_room(rows: usize, cols: usize) -> Self {
        let mut grid = Self::new(rows, cols);
        let border = ROOM_BORDER_CELLS.min(rows / 2).min(cols / 2);
        for r in 0..rows {
            for c in 0..cols {
                if r < border || r >= rows - border || c < border || c >= cols - border {
                    grid.cells[r * cols + c] = true;
                }
            }
        }

        let wall_start = (cols / 2).saturating_sub(ROOM_WALL_CELLS / 2);
        let wall_end = (wall_start + ROOM_WALL_CELLS).min(cols);
        let door_height = ROOM_MIN_DOOR_CELLS.max(rows / 8);
        let door_start = rows.saturating_sub(door_height) / 2;
        let door_end = door_start + door_height;
        for r in border..rows.saturating_sub(border) {
            if (door_start..door_end).contains(&r) {
                continue;
            }
            for c in wall_start..wall_end {
                grid.cells[r * cols + c] = true;
            }
        }
        grid
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn in_bounds(&self, point: Point) -> bool {
        point.row >= 0
            && point.col >= 0
            && (point.row as usize) < self.rows
            && (point.col as usize) < self.cols
    }

    /// Off-grid points count as blocked.
    pub fn is_blocked(&self, point: Point) -> bool {
        match self.index(point) {
            Some(idx) => self.cells[idx],
            None => true,
        }
    }

    pub fn is_free(&self, point: Point) -> bool {
        !self.is_blocked(point)
    }

    /// Set a cell; returns false when the point is off-grid.
    pub fn set_blocked(&mut self, point: Point, blocked: bool) -> bool {
        match self.index(point) {
            Some(idx) => {
                self.cells[idx] = blocked;
                true
            }
            None => false,
        }
    }

    /// All points in row-major order.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.rows)
            .flat_map(move |r| (0..self.cols).map(move |c| Point::new(r as i32, c as i32)))
    }

    pub fn free_cells(&self) -> impl Iterator<Item = Point> + '_ {
        self.points().filter(move |p| self.is_free(*p))
    }

    pub fn free_count(&self) -> usize {
        self.cells.iter().filter(|blocked| !**blocked).count()
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(self.rows * (self.cols + 1));
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.push(if self.cells[r * self.cols + c] { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }

    fn index(&self, point: Point) -> Option<usize> {
        if self.in_bounds(point) {
            Some(point.row as usize * self.cols + point.col as usize)
        } else {
            None
        }
    }
}

impl TryFrom<Vec<Vec<bool>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<bool>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<bool>> {
    fn from(grid: Grid) -> Self {
        if grid.cols == 0 {
            return vec![Vec::new(); grid.rows];
        }
        grid.cells.chunks(grid.cols).map(<[bool]>::to_vec).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointStatus {
    #[default]
    Pending,
    Visited,
    Failed,
}

/// A point to visit. Status only ever moves forward out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub point: Point,
    #[serde(default)]
    pub status: WaypointStatus,
}

impl Waypoint {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            status: WaypointStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == WaypointStatus::Pending
    }

    /// Returns false if the waypoint had already left `Pending`.
    pub fn mark_visited(&mut self) -> bool {
        self.advance(WaypointStatus::Visited)
    }

    pub fn mark_failed(&mut self) -> bool {
        self.advance(WaypointStatus::Failed)
    }

    fn advance(&mut self, status: WaypointStatus) -> bool {
        if self.status != WaypointStatus::Pending {
            return false;
        }
        self.status = status;
        true
    }
}

impl From<Point> for Waypoint {
    fn from(point: Point) -> Self {
        Self::new(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Outbound,
    Return,
}

/// One waypoint-to-waypoint stretch of a [`Path`].
///
/// `start..end` is the half-open range of path points this leg contributed.
/// The first leg owns its start point; later legs start right after the shared joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLeg {
    pub kind: LegKind,
    pub from_waypoint: usize,
    pub to_waypoint: usize,
    pub start: usize,
    pub end: usize,
}

/// Ordered cell sequence with tagged outbound/return legs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    points: Vec<Point>,
    legs: Vec<PathLeg>,
}

impl Path {
    /// Untagged path, e.g. a single segment from the search.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            legs: Vec::new(),
        }
    }

    /// Append a segment, dropping its first point when it duplicates the current tail.
    pub fn push_leg(
        &mut self,
        kind: LegKind,
        from_waypoint: usize,
        to_waypoint: usize,
        segment: &[Point],
    ) {
        let start = self.points.len();
        let skip = match (self.points.last(), segment.first()) {
            (Some(tail), Some(head)) if tail == head => 1,
            _ => 0,
        };
        self.points.extend_from_slice(&segment[skip.min(segment.len())..]);
        self.legs.push(PathLeg {
            kind,
            from_waypoint,
            to_waypoint,
            start,
            end: self.points.len(),
        });
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn legs(&self) -> &[PathLeg] {
        &self.legs
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Index of the first point appended by the closing leg, if any.
    pub fn return_start_index(&self) -> Option<usize> {
        self.legs
            .iter()
            .find(|leg| leg.kind == LegKind::Return)
            .map(|leg| leg.start)
    }

    pub fn outbound_points(&self) -> &[Point] {
        let end = self.return_start_index().unwrap_or(self.points.len());
        &self.points[..end]
    }

    pub fn return_points(&self) -> &[Point] {
        match self.return_start_index() {
            Some(start) => &self.points[start..],
            None => &[],
        }
    }

    /// Sum of Euclidean step lengths.
    pub fn length(&self) -> f64 {
        crate::spatial::path_length(&self.points)
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}

/// Symmetric table of true path costs between waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    size: usize,
    costs: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            costs: vec![0.0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.costs[from * self.size + to]
    }

    pub fn set_symmetric(&mut self, a: usize, b: usize, cost: f64) {
        self.costs[a * self.size + b] = cost;
        self.costs[b * self.size + a] = cost;
    }

    /// Cost of visiting `order` and closing back to its first entry.
    pub fn tour_cost(&self, order: &[usize]) -> f64 {
        if order.len() < 2 {
            return 0.0;
        }
        let open: f64 = order.windows(2).map(|pair| self.get(pair[0], pair[1])).sum();
        open + self.get(order[order.len() - 1], order[0])
    }
}

/// A placed sensor. Its coverage region is every free cell within `range`
/// with unobstructed line of sight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub point: Point,
    pub range: f64,
}

/// Distances recorded by one rotating scan, keyed by angle in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub origin: Point,
    pub range: f64,
    pub distances: BTreeMap<u16, f64>,
}

impl ScanResult {
    pub fn distance(&self, angle_deg: u16) -> Option<f64> {
        self.distances.get(&angle_deg).copied()
    }

    /// Fractional (row, col) end of each ray, for drawing.
    pub fn ray_endpoints(&self) -> Vec<(f64, f64)> {
        self.distances
            .iter()
            .map(|(angle, distance)| {
                let (drow, dcol) = heading_vector(f64::from(*angle));
                (
                    self.origin.row as f64 + drow * distance,
                    self.origin.col as f64 + dcol * distance,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip_keeps_layout() {
        let text = "#..\n.#.\n..#\n";
        let grid = Grid::from_ascii(text).unwrap();
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 3);
        assert!(grid.is_blocked(Point::new(1, 1)));
        assert!(grid.is_free(Point::new(0, 1)));
        assert_eq!(grid.to_ascii(), text);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Grid::from_rows(vec![vec![false, false], vec![true]]).unwrap_err();
        assert!(matches!(err, GridError::RaggedRow { row: 1, found: 1, expected: 2 }));
    }

    #[test]
    fn off_grid_points_are_blocked() {
        let grid = Grid::new(2, 2);
        assert!(grid.is_blocked(Point::new(-1, 0)));
        assert!(grid.is_blocked(Point::new(0, 2)));
        assert!(grid.is_free(Point::new(1, 1)));
    }

    #[test]
    fn grid_serializes_as_nested_rows() {
        let mut grid = Grid::new(2, 3);
        grid.set_blocked(Point::new(0, 2), true);
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json, serde_json::json!([[false, false, true], [false, false, false]]));
        let back: Grid = serde_json::from_value(json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn walled_room_has_border_wall_and_door() {
        let grid = Grid::walled_room(64, 64);
        assert!(grid.is_blocked(Point::new(0, 0)));
        assert!(grid.is_blocked(Point::new(63, 30)));
        // Wall column away from the door.
        assert!(grid.is_blocked(Point::new(12, 32)));
        // Door in the middle of the wall.
        assert!(grid.is_free(Point::new(32, 32)));
        assert!(grid.is_free(Point::new(20, 20)));
    }

    #[test]
    fn waypoint_status_never_goes_backwards() {
        let mut waypoint = Waypoint::new(Point::new(1, 1));
        assert!(waypoint.mark_visited());
        assert!(!waypoint.mark_failed());
        assert!(!waypoint.mark_visited());
        assert_eq!(waypoint.status, WaypointStatus::Visited);
    }

    #[test]
    fn legs_drop_duplicated_joint() {
        let mut path = Path::default();
        path.push_leg(LegKind::Outbound, 0, 1, &[Point::new(0, 0), Point::new(0, 1)]);
        path.push_leg(LegKind::Return, 1, 0, &[Point::new(0, 1), Point::new(0, 0)]);
        assert_eq!(path.points(), &[Point::new(0, 0), Point::new(0, 1), Point::new(0, 0)]);
        assert_eq!(path.return_start_index(), Some(2));
        assert_eq!(path.return_points(), &[Point::new(0, 0)]);
        assert_eq!(path.outbound_points().len(), 2);
    }

    #[test]
    fn tour_cost_closes_the_loop() {
        let mut matrix = DistanceMatrix::new(3);
        matrix.set_symmetric(0, 1, 1.0);
        matrix.set_symmetric(1, 2, 2.0);
        matrix.set_symmetric(0, 2, 4.0);
        assert_eq!(matrix.tour_cost(&[0, 1, 2]), 7.0);
        assert_eq!(matrix.get(2, 0), 4.0);
    }
}
