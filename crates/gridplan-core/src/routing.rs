//! Multi-waypoint routing: visiting-order selection and path stitching.

use crate::error::PlanError;
use crate::models::{DistanceMatrix, Grid, LegKind, Path, Point};
use crate::route_engine::find_segment;
use crate::rules::{OrderingStrategy, RouteRules};
use crate::spatial::{buffer_obstacles, inflate_obstacles, octile_distance, path_length};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Above this many waypoints the exact ordering gives way to nearest-neighbour.
pub const EXACT_ORDERING_MAX_WAYPOINTS: usize = 6;

/// A stitched closed route and the waypoint order it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub path: Path,
    /// Indices into the input waypoint list, in visiting order.
    pub order: Vec<usize>,
    /// Failure of the obstacle-grown attempt when the raw-grid retry succeeded.
    #[serde(skip)]
    pub fallback_from: Option<PlanError>,
}

/// Plan a closed route through all waypoints.
///
/// Atomic: any failing segment, including the closing leg, fails the whole call.
pub fn plan_route(
    grid: &Grid,
    waypoints: &[Point],
    rules: &RouteRules,
) -> Result<RoutePlan, PlanError> {
    if waypoints.len() < 2 {
        return Err(PlanError::InsufficientWaypoints {
            count: waypoints.len(),
        });
    }
    if let Some(blocked) = waypoints.iter().find(|p| grid.is_blocked(**p)) {
        return Err(PlanError::BlockedEndpoint(*blocked));
    }

    let order = if rules.optimize_order && waypoints.len() > 2 {
        order_waypoints(grid, waypoints, rules.strategy)
    } else {
        (0..waypoints.len()).collect()
    };
    tracing::debug!(waypoints = waypoints.len(), ?order, "stitching route");

    let stitch_grid = prepare_grid(grid, waypoints, rules);
    let path = stitch(&stitch_grid, waypoints, &order)?;
    tracing::debug!(points = path.len(), length = path.length(), "route stitched");
    Ok(RoutePlan {
        path,
        order,
        fallback_from: None,
    })
}

/// Plan with obstacle growth first and, if that fails, once more on the raw grid.
pub fn plan_route_with_fallback(
    grid: &Grid,
    waypoints: &[Point],
    rules: &RouteRules,
) -> Result<RoutePlan, PlanError> {
    if !rules.is_obstacle_growing() {
        return plan_route(grid, waypoints, rules);
    }
    match plan_route(grid, waypoints, rules) {
        Ok(plan) => Ok(plan),
        Err(err @ PlanError::InsufficientWaypoints { .. }) => Err(err),
        Err(err @ PlanError::BlockedEndpoint(_)) => Err(err),
        Err(err) => {
            tracing::warn!("Buffered route failed ({}), retrying on unbuffered grid", err);
            let mut plan = plan_route(grid, waypoints, &rules.without_obstacle_growth())?;
            plan.fallback_from = Some(err);
            Ok(plan)
        }
    }
}

fn prepare_grid<'a>(grid: &'a Grid, waypoints: &[Point], rules: &RouteRules) -> Cow<'a, Grid> {
    let mut prepared = Cow::Borrowed(grid);
    if let Some(radius) = rules.footprint_radius.filter(|r| *r > 0.0) {
        prepared = Cow::Owned(inflate_obstacles(&prepared, waypoints, radius));
    }
    if let Some(radius) = rules.buffer_radius.filter(|r| *r > 0) {
        prepared = Cow::Owned(buffer_obstacles(&prepared, waypoints, radius));
    }
    prepared
}

fn stitch(grid: &Grid, waypoints: &[Point], order: &[usize]) -> Result<Path, PlanError> {
    let mut path = Path::default();
    for pair in order.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let segment = find_segment(grid, waypoints[from], waypoints[to])?;
        tracing::trace!(from, to, points = segment.len(), "outbound leg");
        path.push_leg(LegKind::Outbound, from, to, &segment);
    }

    let (last, first) = (order[order.len() - 1], order[0]);
    let closing = find_segment(grid, waypoints[last], waypoints[first]).map_err(|err| match err {
        PlanError::NoPathFound { start, goal } => PlanError::RouteIncomplete {
            from: start,
            to: goal,
        },
        other => other,
    })?;
    path.push_leg(LegKind::Return, last, first, &closing);
    Ok(path)
}

/// Choose a visiting order; the first waypoint always stays first.
pub fn order_waypoints(grid: &Grid, waypoints: &[Point], strategy: OrderingStrategy) -> Vec<usize> {
    match strategy {
        OrderingStrategy::NearestNeighbor => heuristic_order(waypoints),
        OrderingStrategy::DistanceMatrix => match distance_matrix(grid, waypoints) {
            Ok(matrix) if matrix.size() <= EXACT_ORDERING_MAX_WAYPOINTS => exact_order(&matrix),
            Ok(matrix) => nearest_neighbor_order(matrix.size(), |a, b| matrix.get(a, b)),
            Err(err) => {
                tracing::warn!("{}, falling back to nearest-neighbor ordering", err);
                heuristic_order(waypoints)
            }
        },
    }
}

/// Nearest-neighbour on octile estimates.
pub fn heuristic_order(waypoints: &[Point]) -> Vec<usize> {
    nearest_neighbor_order(waypoints.len(), |a, b| {
        octile_distance(waypoints[a], waypoints[b])
    })
}

/// Greedy tour from index 0; ties go to the earliest index.
pub fn nearest_neighbor_order<F>(count: usize, cost: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> f64,
{
    if count == 0 {
        return Vec::new();
    }
    let mut remaining: Vec<usize> = (1..count).collect();
    let mut order = Vec::with_capacity(count);
    order.push(0);

    while !remaining.is_empty() {
        let tail = order[order.len() - 1];
        let mut best_pos = 0;
        let mut best_cost = f64::INFINITY;
        for (pos, candidate) in remaining.iter().enumerate() {
            let c = cost(tail, *candidate);
            if c < best_cost {
                best_cost = c;
                best_pos = pos;
            }
        }
        order.push(remaining.remove(best_pos));
    }
    order
}

/// True path costs between every waypoint pair.
///
/// Costs are assumed symmetric: only `i < j` is searched and mirrored.
pub fn distance_matrix(grid: &Grid, waypoints: &[Point]) -> Result<DistanceMatrix, PlanError> {
    let mut matrix = DistanceMatrix::new(waypoints.len());
    for i in 0..waypoints.len() {
        for j in (i + 1)..waypoints.len() {
            let segment = find_segment(grid, waypoints[i], waypoints[j]).map_err(|_| {
                PlanError::DistanceMatrixIncomplete {
                    from: waypoints[i],
                    to: waypoints[j],
                }
            })?;
            matrix.set_symmetric(i, j, path_length(&segment));
        }
    }
    Ok(matrix)
}

/// Minimum-cost closed tour with index 0 fixed, by exhaustive search.
/// Permutations are tried in lexicographic order and the first minimum wins.
pub fn exact_order(matrix: &DistanceMatrix) -> Vec<usize> {
    let n = matrix.size();
    if n <= 2 {
        return (0..n).collect();
    }
    let mut best = Tour {
        cost: f64::INFINITY,
        order: (0..n).collect(),
    };
    let mut current = Vec::with_capacity(n);
    current.push(0);
    let mut used = vec![false; n];
    used[0] = true;
    search_permutations(matrix, &mut current, &mut used, &mut best);
    tracing::debug!(cost = best.cost, order = ?best.order, "exact ordering");
    best.order
}

struct Tour {
    cost: f64,
    order: Vec<usize>,
}

fn search_permutations(
    matrix: &DistanceMatrix,
    current: &mut Vec<usize>,
    used: &mut [bool],
    best: &mut Tour,
) {
    if current.len() == used.len() {
        let cost = matrix.tour_cost(current);
        if cost < best.cost {
            best.cost = cost;
            best.order.clone_from(current);
        }
        return;
    }
    for next in 1..used.len() {
        if used[next] {
            continue;
        }
        used[next] = true;
        current.push(next);
        search_permutations(matrix, current, used, best);
        current.pop();
        used[next] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(raw: &[(i32, i32)]) -> Vec<Point> {
        raw.iter().map(|p| Point::from(*p)).collect()
    }

    fn all_tours(n: usize) -> Vec<Vec<usize>> {
        // Every sequence 0, a, b, ... over 1..n without repeats, counted in base n.
        let rest = n - 1;
        let mut tours = Vec::new();
        let total = (n as u64).pow(rest as u32);
        for code in 0..total {
            let mut digits = Vec::with_capacity(rest);
            let mut value = code;
            for _ in 0..rest {
                digits.push((value % n as u64) as usize);
                value /= n as u64;
            }
            let mut seen = vec![false; n];
            seen[0] = true;
            if digits.iter().all(|d| *d != 0 && !std::mem::replace(&mut seen[*d], true)) {
                let mut tour = vec![0];
                tour.extend(digits);
                tours.push(tour);
            }
        }
        tours
    }

    #[test]
    fn fewer_than_two_waypoints_is_rejected() {
        let grid = Grid::new(4, 4);
        let err = plan_route(&grid, &points(&[(1, 1)]), &RouteRules::default()).unwrap_err();
        assert_eq!(err, PlanError::InsufficientWaypoints { count: 1 });
    }

    #[test]
    fn square_tour_keeps_input_or_reverse_order() {
        let grid = Grid::new(6, 6);
        let waypoints = points(&[(0, 0), (0, 5), (5, 5), (5, 0)]);
        let plan = plan_route(&grid, &waypoints, &RouteRules::default()).unwrap();
        assert!(plan.order == vec![0, 1, 2, 3] || plan.order == vec![0, 3, 2, 1]);
        assert_eq!(plan.path.first(), Some(Point::new(0, 0)));
        assert_eq!(plan.path.last(), Some(Point::new(0, 0)));
        assert!((plan.path.length() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn return_leg_index_points_after_last_waypoint() {
        let grid = Grid::new(10, 10);
        let waypoints = points(&[(1, 1), (1, 8), (8, 8)]);
        let rules = RouteRules {
            optimize_order: false,
            ..RouteRules::default()
        };
        let plan = plan_route(&grid, &waypoints, &rules).unwrap();
        let idx = plan.path.return_start_index().unwrap();
        let pts = plan.path.points();
        assert_eq!(pts[idx - 1], Point::new(8, 8));
        assert_eq!(pts[pts.len() - 1], Point::new(1, 1));
        let return_leg = plan.path.legs().last().unwrap();
        assert_eq!(return_leg.kind, LegKind::Return);
        assert_eq!((return_leg.from_waypoint, return_leg.to_waypoint), (2, 0));
        assert_eq!(return_leg.start, idx);
        assert_eq!(plan.path.return_points(), &pts[idx..]);
    }

    #[test]
    fn two_waypoints_make_out_and_back() {
        let grid = Grid::new(5, 5);
        let plan = plan_route(&grid, &points(&[(0, 0), (0, 3)]), &RouteRules::default()).unwrap();
        assert_eq!(plan.order, vec![0, 1]);
        assert_eq!(plan.path.len(), 7);
        assert_eq!(plan.path.return_start_index(), Some(4));
    }

    #[test]
    fn planning_is_idempotent() {
        let grid = Grid::walled_room(60, 60);
        let waypoints = points(&[(15, 15), (45, 45), (15, 45), (45, 15), (30, 20)]);
        let rules = RouteRules::default();
        let first = plan_route(&grid, &waypoints, &rules).unwrap();
        let second = plan_route(&grid, &waypoints, &rules).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn exact_order_is_global_minimum() {
        let grid = Grid::walled_room(60, 60);
        let waypoints = points(&[(15, 15), (44, 44), (15, 40), (40, 14), (28, 22), (20, 47)]);
        let matrix = distance_matrix(&grid, &waypoints).unwrap();
        let order = exact_order(&matrix);
        let best = matrix.tour_cost(&order);
        let tours = all_tours(waypoints.len());
        assert_eq!(tours.len(), 120);
        for tour in tours {
            assert!(best <= matrix.tour_cost(&tour) + 1e-9);
        }
        assert_eq!(order[0], 0);
    }

    #[test]
    fn nearest_neighbor_follows_closest_tail() {
        let waypoints = points(&[(0, 0), (0, 9), (0, 2), (0, 5)]);
        assert_eq!(heuristic_order(&waypoints), vec![0, 2, 3, 1]);
    }

    #[test]
    fn large_sets_use_greedy_on_true_costs() {
        let grid = Grid::new(3, 30);
        let waypoints = points(&[(1, 0), (1, 20), (1, 3), (1, 12), (1, 6), (1, 27), (1, 9)]);
        let order = order_waypoints(&grid, &waypoints, OrderingStrategy::DistanceMatrix);
        assert_eq!(order, vec![0, 2, 4, 6, 3, 1, 5]);
    }

    #[test]
    fn unreachable_pair_fails_matrix_and_route() {
        let grid = Grid::from_ascii(
            "\
......
......
######
......",
        )
        .unwrap();
        let waypoints = points(&[(0, 0), (1, 5), (3, 2)]);
        let err = distance_matrix(&grid, &waypoints).unwrap_err();
        assert!(matches!(err, PlanError::DistanceMatrixIncomplete { .. }));

        // Falls back to the heuristic order, then fails atomically while stitching.
        let err = plan_route(&grid, &waypoints, &RouteRules::default()).unwrap_err();
        assert!(matches!(err, PlanError::NoPathFound { .. }));
    }

    #[test]
    fn off_grid_waypoints_fail_before_ordering() {
        let grid = Grid::new(6, 6);
        let waypoints = vec![
            Point::new(1, 1),
            Point::new(i32::MIN, 0),
            Point::new(i32::MAX, 0),
        ];
        for strategy in [OrderingStrategy::NearestNeighbor, OrderingStrategy::DistanceMatrix] {
            let rules = RouteRules {
                strategy,
                ..RouteRules::default()
            };
            let err = plan_route(&grid, &waypoints, &rules).unwrap_err();
            assert_eq!(err, PlanError::BlockedEndpoint(Point::new(i32::MIN, 0)));
        }
        let estimate = heuristic_order(&waypoints);
        assert_eq!(estimate.len(), 3);
    }

    #[test]
    fn buffered_failure_retries_on_raw_grid() {
        // One-cell gap in the wall closes once obstacles are buffered.
        let grid = Grid::from_ascii(
            "\
.........
.........
####.####
.........
.........",
        )
        .unwrap();
        let waypoints = points(&[(0, 1), (4, 7)]);
        let rules = RouteRules {
            buffer_radius: Some(1),
            ..RouteRules::default()
        };
        assert!(plan_route(&grid, &waypoints, &rules).is_err());
        let plan = plan_route_with_fallback(&grid, &waypoints, &rules).unwrap();
        assert!(matches!(plan.fallback_from, Some(PlanError::NoPathFound { .. })));
        assert!(plan.path.points().contains(&Point::new(2, 4)));
    }

    #[test]
    fn buffering_never_blocks_waypoints() {
        let grid = Grid::from_ascii(
            "\
..........
.#........
..........
..........",
        )
        .unwrap();
        let waypoints = points(&[(0, 1), (3, 9)]);
        let rules = RouteRules {
            buffer_radius: Some(1),
            ..RouteRules::default()
        };
        let plan = plan_route(&grid, &waypoints, &rules).unwrap();
        assert_eq!(plan.path.first(), Some(Point::new(0, 1)));
    }
}
