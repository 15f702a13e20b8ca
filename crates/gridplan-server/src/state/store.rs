//! In-memory exploration session registry using DashMap.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gridplan_core::{ExplorationReport, ExplorationSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::Config;

const STREAM_CAPACITY: usize = 256;

struct SessionEntry {
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    /// Monotonic finish time used for retention
    finished_instant: Option<Instant>,
    snapshot: ExplorationSnapshot,
    report: Option<ExplorationReport>,
    cancel: watch::Sender<bool>,
}

/// Public view of a session, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub snapshot: ExplorationSnapshot,
    pub report: Option<ExplorationReport>,
}

/// Frame pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Snapshot {
        session_id: String,
        snapshot: ExplorationSnapshot,
    },
    Report {
        session_id: String,
        report: ExplorationReport,
    },
}

impl SessionEvent {
    pub fn to_json(&self) -> Arc<str> {
        serde_json::to_string(self).unwrap_or_default().into()
    }
}

/// Pre-serialized event on the shared broadcast channel.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub session_id: String,
    pub payload: Arc<str>,
    /// Last frame for this session
    pub is_final: bool,
}

/// Application state - sessions, stream fan-out and shutdown signal.
pub struct AppState {
    config: Config,
    sessions: DashMap<String, SessionEntry>,
    /// Sessions registered and not yet finished
    running: AtomicUsize,
    pub tx: broadcast::Sender<StreamMessage>,
    shutdown: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (tx, _) = broadcast::channel(STREAM_CAPACITY);
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            sessions: DashMap::new(),
            running: AtomicUsize::new(0),
            tx,
            shutdown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Signal every background loop to stop.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Sessions that have not produced a final report yet.
    pub fn running_sessions(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Register a new session. Returns `None` when the running-session cap is reached.
    ///
    /// The slot is reserved atomically, so concurrent creates never exceed the cap.
    pub fn register_session(
        &self,
        snapshot: ExplorationSnapshot,
    ) -> Option<(String, watch::Receiver<bool>)> {
        let max = self.config.max_sessions;
        self.running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()?;
        let session_id = Uuid::new_v4().to_string();
        let (cancel, cancel_rx) = watch::channel(false);
        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                created_at: Utc::now(),
                finished_at: None,
                finished_instant: None,
                snapshot,
                report: None,
                cancel,
            },
        );
        Some((session_id, cancel_rx))
    }

    pub fn session_view(&self, session_id: &str) -> Option<SessionView> {
        self.sessions.get(session_id).map(|entry| SessionView {
            session_id: session_id.to_string(),
            created_at: entry.created_at,
            finished_at: entry.finished_at,
            snapshot: entry.snapshot.clone(),
            report: entry.report.clone(),
        })
    }

    pub fn publish_snapshot(&self, session_id: &str, snapshot: ExplorationSnapshot) {
        let event = SessionEvent::Snapshot {
            session_id: session_id.to_string(),
            snapshot: snapshot.clone(),
        };
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.snapshot = snapshot;
        }
        self.broadcast(session_id, &event, false);
    }

    pub fn finish_session(
        &self,
        session_id: &str,
        snapshot: ExplorationSnapshot,
        report: ExplorationReport,
    ) {
        let event = SessionEvent::Report {
            session_id: session_id.to_string(),
            report: report.clone(),
        };
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            if entry.report.is_none() {
                self.running.fetch_sub(1, Ordering::AcqRel);
            }
            entry.snapshot = snapshot;
            entry.report = Some(report);
            entry.finished_at = Some(Utc::now());
            entry.finished_instant = Some(Instant::now());
        }
        self.broadcast(session_id, &event, true);
    }

    /// Drop finished sessions older than `retention`. Returns how many were removed.
    pub fn evict_finished(&self, retention: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| match entry.finished_instant {
            Some(finished) => finished.elapsed() < retention,
            None => true,
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Request cancellation. Returns false for an unknown session.
    pub fn cancel_session(&self, session_id: &str) -> bool {
        match self.sessions.get(session_id) {
            Some(entry) => {
                entry.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    fn broadcast(&self, session_id: &str, event: &SessionEvent, is_final: bool) {
        // No subscribers is fine.
        let _ = self.tx.send(StreamMessage {
            session_id: session_id.to_string(),
            payload: event.to_json(),
            is_final,
        });
    }
}
