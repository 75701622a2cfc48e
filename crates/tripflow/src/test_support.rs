//! Deterministic test doubles for the three collaborator seams.
//!
//! These are ordinary library types rather than `#[cfg(test)]` items so
//! that integration tests and downstream crates can drive a full session
//! without a network: a [`ScriptedAssistant`] that replays queued replies,
//! a [`StaticDistances`] provider that derives stable distances from the
//! coordinates themselves, and an [`InMemoryTripStore`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::assistant::{AssistantReply, AssistantRequest, GraphAssistant};
use crate::distance::{Distance, DistanceProvider};
use crate::error::{Error, Result};
use crate::graph::Coordinates;
use crate::persist::{PersistedGraph, TripRecord, TripStore};

/// Assistant double that pops queued replies in order and records every
/// request it sees.
#[derive(Default)]
pub struct ScriptedAssistant {
    replies: Mutex<Vec<AssistantReply>>,
    requests: Arc<Mutex<Vec<AssistantRequest>>>,
    failure: Option<String>,
}

impl ScriptedAssistant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply. Replies are consumed first-in first-out.
    #[must_use]
    pub fn with_reply(self, reply: AssistantReply) -> Self {
        self.replies.lock().push(reply);
        self
    }

    /// Make every `propose` call fail with the given message.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Shared handle to the recorded requests, usable after the assistant
    /// has been moved into a session.
    #[must_use]
    pub fn requests_handle(&self) -> Arc<Mutex<Vec<AssistantRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl GraphAssistant for ScriptedAssistant {
    async fn propose(&self, request: &AssistantRequest) -> Result<AssistantReply> {
        self.requests.lock().push(request.clone());
        if let Some(message) = &self.failure {
            return Err(Error::Assistant(message.clone()));
        }
        let mut replies = self.replies.lock();
        if replies.is_empty() {
            return Err(Error::Assistant("no scripted reply queued".to_string()));
        }
        Ok(replies.remove(0))
    }
}

fn pair_key(from: &Coordinates, to: &Coordinates) -> String {
    format!("{:.4},{:.4}->{:.4},{:.4}", from.lat, from.lng, to.lat, to.lng)
}

/// Distance provider double. Distances are a pure function of the
/// coordinates (equirectangular approximation), so every test run sees the
/// same values without any network.
#[derive(Default)]
pub struct StaticDistances {
    calls: AtomicUsize,
    failing_pairs: HashSet<String>,
    unroutable_pairs: HashSet<String>,
    delay: Option<Duration>,
}

impl StaticDistances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make lookups between these exact coordinates return an error.
    #[must_use]
    pub fn fail_between(mut self, from: &Coordinates, to: &Coordinates) -> Self {
        self.failing_pairs.insert(pair_key(from, to));
        self
    }

    /// Make lookups between these exact coordinates find no route.
    #[must_use]
    pub fn no_route_between(mut self, from: &Coordinates, to: &Coordinates) -> Self {
        self.unroutable_pairs.insert(pair_key(from, to));
        self
    }

    /// Make every lookup sleep before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Total lookups performed, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistanceProvider for StaticDistances {
    async fn distance(&self, from: &Coordinates, to: &Coordinates) -> Result<Option<Distance>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = pair_key(from, to);
        if self.failing_pairs.contains(&key) {
            return Err(Error::Distance(format!("scripted failure for {key}")));
        }
        if self.unroutable_pairs.contains(&key) {
            return Ok(None);
        }

        let mean_lat = ((from.lat + to.lat) / 2.0).to_radians();
        let dx = (to.lng - from.lng).to_radians() * mean_lat.cos();
        let dy = (to.lat - from.lat).to_radians();
        let meters = ((dx * dx + dy * dy).sqrt() * 6_371_000.0).round().max(1.0) as u64;
        let seconds = meters / 14; // roughly 50 km/h
        Ok(Some(Distance {
            distance_text: format!("{:.2} km", meters as f64 / 1000.0),
            duration_text: format!("{} mins", seconds / 60),
            distance_meters: meters,
            duration_seconds: seconds,
        }))
    }
}

/// In-memory [`TripStore`] that records every successful save.
#[derive(Default)]
pub struct InMemoryTripStore {
    records: Mutex<HashMap<String, TripRecord>>,
    saves: Mutex<Vec<(String, PersistedGraph)>>,
    fail_next_save: Mutex<bool>,
    delay_next_save: Mutex<Option<Duration>>,
}

impl InMemoryTripStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_trip(&self, record: TripRecord) {
        self.records.lock().insert(record.id.clone(), record);
    }

    /// Make exactly the next `save_graph` call fail.
    pub fn fail_next_save(&self) {
        *self.fail_next_save.lock() = true;
    }

    /// Make exactly the next `save_graph` call stall before writing.
    pub fn delay_next_save(&self, delay: Duration) {
        *self.delay_next_save.lock() = Some(delay);
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.lock().len()
    }

    /// The most recently saved graph for a trip, if any.
    #[must_use]
    pub fn last_saved(&self, trip_id: &str) -> Option<PersistedGraph> {
        self.saves
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id == trip_id)
            .map(|(_, graph)| graph.clone())
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn load_trip(&self, trip_id: &str) -> Result<Option<TripRecord>> {
        Ok(self.records.lock().get(trip_id).cloned())
    }

    async fn save_graph(&self, trip_id: &str, graph: &PersistedGraph) -> Result<()> {
        if std::mem::take(&mut *self.fail_next_save.lock()) {
            return Err(Error::Store("scripted save failure".to_string()));
        }
        let delay = self.delay_next_save.lock().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.saves
            .lock()
            .push((trip_id.to_string(), graph.clone()));
        if let Some(record) = self.records.lock().get_mut(trip_id) {
            record.nodes = graph.nodes.clone();
            record.edges = graph.edges.clone();
        }
        Ok(())
    }
}
