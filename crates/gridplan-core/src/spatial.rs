//! Grid geometry: line of sight, digital lines, obstacle buffering and path measures.

use crate::models::{Grid, Point};
use std::collections::HashSet;
use std::f64::consts::SQRT_2;

/// Octile distance for 8-connected moves with cardinal cost 1 and diagonal cost √2.
pub fn octile_distance(a: Point, b: Point) -> f64 {
    let dr = a.row.abs_diff(b.row) as f64;
    let dc = a.col.abs_diff(b.col) as f64;
    (dr + dc) + (SQRT_2 - 2.0) * dr.min(dc)
}

/// Unit (row, col) direction for a heading in degrees.
/// 0° points along +col, 90° along -row.
pub fn heading_vector(angle_deg: f64) -> (f64, f64) {
    let rad = angle_deg.to_radians();
    (-rad.sin(), rad.cos())
}

/// Sampled visibility test between two cells.
///
/// Takes `max(2, ceil(2·d))` evenly spaced samples including both endpoints and
/// rounds each to the nearest cell (ties to even). Any blocked or off-grid
/// sample breaks the line.
pub fn has_line_of_sight(grid: &Grid, a: Point, b: Point) -> bool {
    if a == b {
        return true;
    }
    let distance = a.distance(b);
    let samples = ((distance * 2.0).ceil() as usize).max(2);
    let (r0, c0) = (a.row as f64, a.col as f64);
    let (r1, c1) = (b.row as f64, b.col as f64);

    for i in 0..samples {
        let t = i as f64 / (samples - 1) as f64;
        let row = r0 * (1.0 - t) + r1 * t;
        let col = c0 * (1.0 - t) + c1 * t;
        let cell = Point::new(row.round_ties_even() as i32, col.round_ties_even() as i32);
        if grid.is_blocked(cell) {
            return false;
        }
    }
    true
}

/// Bresenham traversal from `a` to `b`, both included.
pub fn rasterize_line(a: Point, b: Point) -> Vec<Point> {
    let dx = (b.col - a.col).abs();
    let dy = (b.row - a.row).abs();
    let sx = if a.col < b.col { 1 } else { -1 };
    let sy = if a.row < b.row { 1 } else { -1 };

    let mut points = Vec::with_capacity(dx.max(dy) as usize + 1);
    let mut err = dx - dy;
    let (mut col, mut row) = (a.col, a.row);
    loop {
        points.push(Point::new(row, col));
        if col == b.col && row == b.row {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            col += sx;
        }
        if e2 < dx {
            err += dx;
            row += sy;
        }
    }
    points
}

/// Mark every free cell within Manhattan distance `radius` of a blocked cell
/// as blocked, except the protected points.
pub fn buffer_obstacles(grid: &Grid, protected: &[Point], radius: usize) -> Grid {
    let radius = radius as i32;
    let offsets: Vec<(i32, i32)> = (-radius..=radius)
        .flat_map(|dr| (-radius..=radius).map(move |dc| (dr, dc)))
        .filter(|(dr, dc)| dr.abs() + dc.abs() <= radius)
        .collect();
    grow_obstacles(grid, protected, &offsets)
}

/// Euclidean-disk inflation for a robot footprint.
pub fn inflate_obstacles(grid: &Grid, protected: &[Point], radius: f64) -> Grid {
    grow_obstacles(grid, protected, &disk_offsets(radius))
}

fn grow_obstacles(grid: &Grid, protected: &[Point], offsets: &[(i32, i32)]) -> Grid {
    let protected: HashSet<Point> = protected.iter().copied().collect();
    let mut grown = grid.clone();
    for blocked in grid.points().filter(|p| grid.is_blocked(*p)) {
        for (dr, dc) in offsets {
            let target = blocked.offset(*dr, *dc);
            if grid.in_bounds(target) && !protected.contains(&target) {
                grown.set_blocked(target, true);
            }
        }
    }
    grown
}

/// Offsets whose Euclidean length is at most `radius`.
pub fn disk_offsets(radius: f64) -> Vec<(i32, i32)> {
    if radius < 0.0 {
        return Vec::new();
    }
    let reach = radius.ceil() as i32;
    let radius2 = radius * radius;
    let mut offsets = Vec::new();
    for dr in -reach..=reach {
        for dc in -reach..=reach {
            if f64::from(dr * dr + dc * dc) <= radius2 {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

/// True when no blocked or off-grid cell lies within `radius` of `point`.
pub fn has_clearance(grid: &Grid, point: Point, radius: f64) -> bool {
    disk_offsets(radius)
        .into_iter()
        .all(|(dr, dc)| grid.is_free(point.offset(dr, dc)))
}

/// Sum of Euclidean step lengths.
pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|pair| pair[0].distance(pair[1])).sum()
}

/// Resample a polyline at uniform spacing, always keeping both ends.
/// Used for smooth playback of a planned path.
pub fn resample_path(points: &[Point], step: f64) -> Vec<(f64, f64)> {
    let as_float = |p: &Point| (p.row as f64, p.col as f64);
    if points.len() < 2 || step <= 0.0 {
        return points.iter().map(as_float).collect();
    }

    let mut out = vec![as_float(&points[0])];
    // Distance still owed before the next emitted sample.
    let mut carry = step;
    for pair in points.windows(2) {
        let (r0, c0) = as_float(&pair[0]);
        let (r1, c1) = as_float(&pair[1]);
        let length = (r1 - r0).hypot(c1 - c0);
        if length == 0.0 {
            continue;
        }
        let mut travelled = 0.0;
        while travelled + carry <= length + 1e-9 {
            travelled += carry;
            let t = travelled / length;
            out.push((r0 + (r1 - r0) * t, c0 + (c1 - c0) * t));
            carry = step;
        }
        carry -= length - travelled;
    }
    if let Some(last) = points.last() {
        out.push(as_float(last));
    }
    out
}
