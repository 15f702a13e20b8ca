//! Exploration session driver.
//!
//! Ticks one session at its movement interval until it completes, is
//! cancelled, or the server shuts down.

use gridplan_core::ExplorationSession;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_exploration_loop(
    state: Arc<AppState>,
    session_id: String,
    mut session: ExplorationSession,
    mut cancel: watch::Receiver<bool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(session.rules().step_interval());
    tracing::info!(
        session = %session_id,
        position = %session.position(),
        "Exploration loop started"
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!(session = %session_id, "Exploration loop shutting down");
                session.cancel();
                break;
            }
            // Also resolves if the sender is dropped.
            _ = cancel.wait_for(|cancelled| *cancelled) => {
                session.cancel();
                break;
            }
            _ = ticker.tick() => {
                let running = session.tick();
                if !running {
                    break;
                }
                state.publish_snapshot(&session_id, session.snapshot());
            }
        }
    }

    let report = session.report();
    tracing::info!(
        session = %session_id,
        scanned = report.scanned_cells,
        visited = report.visited,
        failed = report.failed_anchors.len(),
        cancelled = report.cancelled,
        "Exploration loop finished"
    );
    state.finish_session(&session_id, session.snapshot(), report);
}

/// Register a session and spawn its loop. Returns `None` when the session cap is reached.
pub fn spawn_exploration(state: &Arc<AppState>, session: ExplorationSession) -> Option<String> {
    let (session_id, cancel) = state.register_session(session.snapshot())?;
    let shutdown = state.subscribe_shutdown();
    tokio::spawn(run_exploration_loop(
        state.clone(),
        session_id.clone(),
        session,
        cancel,
        shutdown,
    ));
    Some(session_id)
}
