//! Evicts finished exploration sessions once their retention period passes.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

/// Upper bound on how often the registry is swept.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run_session_sweeper(state: Arc<AppState>) {
    let retention = state.config().session_retention;
    let period = retention.min(MAX_SWEEP_INTERVAL).max(Duration::from_millis(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = state.subscribe_shutdown();

    tracing::info!(retention_secs = retention.as_secs(), "Session sweeper started");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Session sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                let evicted = state.evict_finished(retention);
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        remaining = state.session_count(),
                        "Evicted finished sessions"
                    );
                }
            }
        }
    }
}
