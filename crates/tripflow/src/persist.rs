//! Trip storage and the debounced save coordinator.
//!
//! [`TripStore`] is the durable-storage seam: load a trip record, save a
//! graph. [`PersistenceCoordinator`] sits in front of it and turns a burst
//! of commits into one write: each scheduled save resets a quiet-window
//! timer, and only the payload queued when the window finally elapses is
//! written. Last write wins; intermediate states are never persisted.
//! Writes are serialized: a save that outlasts the quiet window completes
//! before the next payload is taken, so the store always converges on the
//! newest state.
//!
//! A save failure is logged and dropped - the next commit schedules the
//! next attempt, so the store converges once it recovers. In-memory state
//! (graph, history) is never blocked or rolled back by storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::Result;
use crate::graph::{Edge, ItineraryGraph, Node};

/// Node bag fields that describe transient UI state, stripped before
/// anything reaches the store.
const EPHEMERAL_FIELDS: [&str; 3] = ["theme", "selected", "dragging"];

/// The stored form of a trip, as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl TripRecord {
    #[must_use]
    pub fn graph(&self) -> ItineraryGraph {
        ItineraryGraph::new(self.nodes.clone(), self.edges.clone())
    }
}

/// A graph prepared for storage: ephemeral UI fields stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl From<&ItineraryGraph> for PersistedGraph {
    fn from(graph: &ItineraryGraph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| {
                let mut node = node.clone();
                for field in EPHEMERAL_FIELDS {
                    node.data.extra.remove(field);
                }
                node
            })
            .collect();
        Self {
            nodes,
            edges: graph.edges.clone(),
        }
    }
}

/// Durable-storage seam.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Load the trip record, or `Ok(None)` if no such trip exists.
    async fn load_trip(&self, trip_id: &str) -> Result<Option<TripRecord>>;

    /// Overwrite the trip's graph.
    async fn save_graph(&self, trip_id: &str, graph: &PersistedGraph) -> Result<()>;
}

/// Observable save status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveState {
    /// A write is currently in flight.
    pub is_saving: bool,
    /// Completion time of the last successful write.
    pub last_saved_at: Option<DateTime<Utc>>,
}

struct CoordinatorInner {
    store: Arc<dyn TripStore>,
    trip_id: String,
    state: Mutex<SaveState>,
    /// The payload the next elapsed window will write. Replaced, never
    /// appended - last write wins.
    queued: Mutex<Option<PersistedGraph>>,
    /// One store write at a time. A payload queued while a write is in
    /// flight is taken by the next pass, never reordered before it.
    write_lock: tokio::sync::Mutex<()>,
}

impl CoordinatorInner {
    async fn run_save(self: Arc<Self>) {
        let _guard = self.write_lock.lock().await;
        let Some(payload) = self.queued.lock().take() else {
            return;
        };
        self.state.lock().is_saving = true;
        match self.store.save_graph(&self.trip_id, &payload).await {
            Ok(()) => {
                let mut state = self.state.lock();
                state.is_saving = false;
                state.last_saved_at = Some(Utc::now());
                debug!(trip_id = %self.trip_id, "trip graph saved");
            }
            Err(error) => {
                self.state.lock().is_saving = false;
                // No retry here: the next scheduled save carries newer
                // state anyway.
                error!(trip_id = %self.trip_id, %error, "trip save failed");
            }
        }
    }
}

/// Debounced writer in front of a [`TripStore`].
///
/// `schedule` is cheap and synchronous; the actual write happens on a
/// spawned task after the quiet window elapses without another schedule.
pub struct PersistenceCoordinator {
    inner: Arc<CoordinatorInner>,
    quiet_window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceCoordinator {
    /// Default quiet window between the last change and the write.
    pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(1500);

    #[must_use]
    pub fn new(store: Arc<dyn TripStore>, trip_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                trip_id: trip_id.into(),
                state: Mutex::new(SaveState::default()),
                queued: Mutex::new(None),
                write_lock: tokio::sync::Mutex::new(()),
            }),
            quiet_window: Self::DEFAULT_QUIET_WINDOW,
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_quiet_window(mut self, quiet_window: Duration) -> Self {
        self.quiet_window = quiet_window;
        self
    }

    /// Queue the graph for saving and (re)start the quiet-window timer.
    ///
    /// Overwrites any previously queued payload. Must be called from within
    /// a tokio runtime.
    pub fn schedule(&self, graph: &ItineraryGraph) {
        *self.inner.queued.lock() = Some(PersistedGraph::from(graph));

        let mut pending = self.pending.lock();
        if let Some(handle) = pending.take() {
            // Only the sleeping timer is cancelled here. A save already
            // handed off to its own task keeps running.
            handle.abort();
        }
        let inner = Arc::clone(&self.inner);
        let quiet_window = self.quiet_window;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_window).await;
            tokio::spawn(inner.run_save());
        }));
    }

    /// Write any queued payload immediately, cancelling the timer.
    ///
    /// For teardown and tests; no-op when nothing is queued.
    pub async fn flush(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
        Arc::clone(&self.inner).run_save().await;
    }

    #[must_use]
    pub fn save_state(&self) -> SaveState {
        *self.inner.state.lock()
    }

    /// Whether a payload is queued but not yet written.
    #[must_use]
    pub fn has_queued(&self) -> bool {
        self.inner.queued.lock().is_some()
    }
}
