//! Exploration loop timing tests.
//!
//! Run on a paused tokio clock so movement steps advance deterministically.

use gridplan_core::{ExplorationRules, ExplorationSession, Grid, Point, WaypointStatus};
use gridplan_server::config::Config;
use gridplan_server::loops::exploration_loop::spawn_exploration;
use gridplan_server::loops::session_sweeper::run_session_sweeper;
use gridplan_server::state::{AppState, SessionView};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;

const SEED: Point = Point::new(30, 30);

fn open_session(speed_cells_per_sec: f64) -> ExplorationSession {
    let rules = ExplorationRules {
        scan_range: 20.0,
        mark_radius: 10.0,
        frontier_threshold: 10.0,
        anchor_distance: 8.0,
        min_wall_clearance: 1.0,
        min_peer_separation: 5.0,
        speed_cells_per_sec,
        ..ExplorationRules::default()
    };
    ExplorationSession::new(Grid::new(60, 60), &[SEED], rules).expect("valid seed")
}

async fn wait_for_report(state: &AppState, session_id: &str, max_wait: Duration) -> SessionView {
    let step = Duration::from_millis(100);
    let mut waited = Duration::ZERO;
    loop {
        let view = state.session_view(session_id).expect("session exists");
        if view.report.is_some() {
            return view;
        }
        assert!(waited < max_wait, "session did not finish in {:?}", max_wait);
        sleep(step).await;
        waited += step;
    }
}

#[tokio::test(start_paused = true)]
async fn session_runs_to_completion() {
    let state = Arc::new(AppState::new(Config::default()));
    let session_id = spawn_exploration(&state, open_session(50.0)).expect("under cap");

    let view = wait_for_report(&state, &session_id, Duration::from_secs(3600)).await;
    let report = view.report.expect("finished");
    assert!(!report.cancelled);
    assert!(report.visited > 1);
    assert!(report.scanned_cells <= 60 * 60);
    assert_eq!(view.snapshot.phase, "complete");
    assert!(view.snapshot.waypoints.iter().all(|w| !w.is_pending()));
    assert_eq!(state.running_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_between_steps() {
    let state = Arc::new(AppState::new(Config::default()));
    let session_id = spawn_exploration(&state, open_session(1.0)).expect("under cap");

    // Ticks at t = 0 (scan), 1 (select), 2 and 3 (one cell each).
    sleep(Duration::from_millis(3500)).await;
    let before = state.session_view(&session_id).unwrap().snapshot;
    assert_eq!(before.phase, "moving");
    assert_ne!(before.position, SEED);

    assert!(state.cancel_session(&session_id));
    let view = wait_for_report(&state, &session_id, Duration::from_secs(5)).await;
    let report = view.report.expect("finished");
    assert!(report.cancelled);
    assert_eq!(view.snapshot.phase, "cancelled");
    assert_eq!(view.snapshot.position, before.position);
    let target = before.target.expect("moving toward a target");
    let waypoint = view
        .snapshot
        .waypoints
        .iter()
        .find(|w| w.point == target)
        .expect("target listed");
    assert_eq!(waypoint.status, WaypointStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_running_sessions() {
    let state = Arc::new(AppState::new(Config::default()));
    let first = spawn_exploration(&state, open_session(1.0)).unwrap();
    let second = spawn_exploration(&state, open_session(1.0)).unwrap();
    sleep(Duration::from_millis(1500)).await;

    state.trigger_shutdown();
    for id in [first, second] {
        let view = wait_for_report(&state, &id, Duration::from_secs(5)).await;
        assert!(view.report.unwrap().cancelled);
    }
}

#[tokio::test(start_paused = true)]
async fn stream_ends_with_final_report() {
    let state = Arc::new(AppState::new(Config::default()));
    let mut rx = state.tx.subscribe();
    let session_id = spawn_exploration(&state, open_session(50.0)).unwrap();

    let mut snapshots = 0;
    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => panic!("stream closed before the report"),
        };
        assert_eq!(msg.session_id, session_id);
        let frame: serde_json::Value = serde_json::from_str(&msg.payload).unwrap();
        if msg.is_final {
            assert_eq!(frame["type"], "report");
            assert_eq!(frame["report"]["cancelled"], false);
            break;
        }
        assert_eq!(frame["type"], "snapshot");
        snapshots += 1;
    }
    assert!(snapshots > 2);
}

#[tokio::test(start_paused = true)]
async fn cap_counts_only_running_sessions() {
    let config = Config {
        max_sessions: 1,
        ..Config::default()
    };
    let state = Arc::new(AppState::new(config));
    let first = spawn_exploration(&state, open_session(1.0)).unwrap();
    assert!(spawn_exploration(&state, open_session(1.0)).is_none());

    state.cancel_session(&first);
    wait_for_report(&state, &first, Duration::from_secs(5)).await;
    assert!(spawn_exploration(&state, open_session(1.0)).is_some());
}

#[tokio::test(start_paused = true)]
async fn extreme_speed_still_finishes_and_frees_its_slot() {
    let config = Config {
        max_sessions: 1,
        ..Config::default()
    };
    let state = Arc::new(AppState::new(config));
    let session_id = spawn_exploration(&state, open_session(1e12)).expect("under cap");

    let view = wait_for_report(&state, &session_id, Duration::from_secs(60)).await;
    assert!(!view.report.expect("finished").cancelled);
    assert_eq!(state.running_sessions(), 0);
    assert!(spawn_exploration(&state, open_session(1.0)).is_some());
}

#[tokio::test(start_paused = true)]
async fn finished_sessions_are_evicted_after_retention() {
    let config = Config {
        session_retention: Duration::from_secs(60),
        ..Config::default()
    };
    let state = Arc::new(AppState::new(config));
    tokio::spawn(run_session_sweeper(state.clone()));

    let finished = spawn_exploration(&state, open_session(1.0)).unwrap();
    let running = spawn_exploration(&state, open_session(0.01)).unwrap();
    state.cancel_session(&finished);
    wait_for_report(&state, &finished, Duration::from_secs(5)).await;

    sleep(Duration::from_secs(30)).await;
    assert!(state.session_view(&finished).is_some());

    sleep(Duration::from_secs(61)).await;
    assert!(state.session_view(&finished).is_none());
    assert!(state.session_view(&running).is_some());
    assert_eq!(state.session_count(), 1);
}

#[test]
fn concurrent_registration_respects_cap() {
    let config = Config {
        max_sessions: 4,
        ..Config::default()
    };
    let state = AppState::new(config);
    let snapshot = open_session(1.0).snapshot();

    let accepted = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..32)
            .map(|_| scope.spawn(|| state.register_session(snapshot.clone()).is_some()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().is_ok_and(|ok| ok))
            .filter(|&ok| ok)
            .count()
    });
    assert_eq!(accepted, 4);
    assert_eq!(state.running_sessions(), 4);
    assert_eq!(state.session_count(), 4);
}
