//! Server configuration from environment.

use gridplan_core::{ExplorationRules, RouteRules};
use std::env;
use std::time::Duration;

/// Playback resampling step used when a route request does not set one.
pub const DEFAULT_PLAYBACK_STEP: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Defaults for route requests that omit `rules`
    pub route_rules: RouteRules,
    /// Defaults for exploration requests that omit `rules`
    pub exploration_rules: ExplorationRules,
    /// Upper bound on concurrently running exploration sessions
    pub max_sessions: usize,
    pub playback_step: f64,
    /// How long a finished session stays queryable before eviction
    pub session_retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            route_rules: RouteRules::default(),
            exploration_rules: ExplorationRules::default(),
            max_sessions: 16,
            playback_step: DEFAULT_PLAYBACK_STEP,
            session_retention: Duration::from_secs(600),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let exploration = defaults.exploration_rules.clone();

        Self {
            server_port: parse_env("GRIDPLAN_PORT").unwrap_or(defaults.server_port),
            route_rules: RouteRules {
                buffer_radius: parse_env("GRIDPLAN_BUFFER_RADIUS"),
                ..defaults.route_rules
            },
            exploration_rules: ExplorationRules {
                scan_range: parse_env("GRIDPLAN_SCAN_RANGE").unwrap_or(exploration.scan_range),
                mark_radius: parse_env("GRIDPLAN_MARK_RADIUS").unwrap_or(exploration.mark_radius),
                bin_size_deg: parse_env("GRIDPLAN_BIN_SIZE_DEG")
                    .unwrap_or(exploration.bin_size_deg),
                speed_cells_per_sec: parse_env("GRIDPLAN_SPEED_CPS")
                    .unwrap_or(exploration.speed_cells_per_sec),
                min_wall_clearance: parse_env("GRIDPLAN_WALL_CLEARANCE")
                    .unwrap_or(exploration.min_wall_clearance),
                min_peer_separation: parse_env("GRIDPLAN_PEER_SEPARATION")
                    .unwrap_or(exploration.min_peer_separation),
                ..exploration
            },
            max_sessions: parse_env("GRIDPLAN_MAX_SESSIONS").unwrap_or(defaults.max_sessions),
            playback_step: defaults.playback_step,
            session_retention: parse_env("GRIDPLAN_SESSION_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_retention),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
