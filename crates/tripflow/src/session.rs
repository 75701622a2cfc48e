//! The planning session controller.
//!
//! A [`SessionController`] owns the live graph for one trip and is the only
//! place mutations are committed. It drives a small state machine:
//!
//! ```text
//! Idle --load()--> Loading --store returns--> Ready
//!                     |                         |
//!                     +---load failure--> Idle  +--> all operations
//! ```
//!
//! Every commit runs the same pipeline regardless of where the mutation
//! came from: repair dangling edges, renumber days, snapshot the previous
//! state into history, swap in the new graph and schedule a debounced
//! save, then layer in distances and schedule again. Undo and redo bypass
//! the pipeline - they restore exact recorded states.

use std::sync::Arc;
use tracing::{info, warn};

use crate::assistant::{AssistantReply, AssistantRequest, ChatMessage, GraphAssistant};
use crate::command::{execute_commands, CommandDiagnostic, GraphCommand};
use crate::distance::{enrich_edge, enrich_edges, DistanceProvider};
use crate::error::{Error, Result};
use crate::graph::{Edge, ItineraryGraph};
use crate::history::GraphHistory;
use crate::normalize::renumber_days;
use crate::persist::{PersistenceCoordinator, SaveState, TripRecord, TripStore};

/// How many prior turns the assistant sees per request.
const HISTORY_WINDOW: usize = 5;

/// Lifecycle of a planning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No trip loaded yet.
    #[default]
    Idle,
    /// A load is in flight; mutations are rejected.
    Loading,
    /// The graph is live and all operations are available.
    Ready,
}

impl SessionState {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Loading => "Loading",
            SessionState::Ready => "Ready",
        }
    }
}

/// What `send_message` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    /// The assistant's conversational answer.
    pub message: String,
    /// Whether the live graph was replaced by this exchange.
    pub graph_committed: bool,
}

/// Owns one trip's live graph, history, conversation, and save scheduling.
pub struct SessionController {
    trip_id: String,
    state: SessionState,
    graph: ItineraryGraph,
    record: Option<TripRecord>,
    history: GraphHistory,
    conversation: Vec<ChatMessage>,
    assistant: Arc<dyn GraphAssistant>,
    distances: Arc<dyn DistanceProvider>,
    store: Arc<dyn TripStore>,
    persistence: PersistenceCoordinator,
}

impl SessionController {
    #[must_use]
    pub fn new(
        trip_id: impl Into<String>,
        assistant: Arc<dyn GraphAssistant>,
        distances: Arc<dyn DistanceProvider>,
        store: Arc<dyn TripStore>,
    ) -> Self {
        let trip_id = trip_id.into();
        let persistence = PersistenceCoordinator::new(Arc::clone(&store), trip_id.clone());
        Self {
            trip_id,
            state: SessionState::Idle,
            graph: ItineraryGraph::default(),
            record: None,
            history: GraphHistory::new(),
            conversation: Vec::new(),
            assistant,
            distances,
            store,
            persistence,
        }
    }

    /// Replace the save coordinator, e.g. to shorten the quiet window.
    #[must_use]
    pub fn with_persistence(mut self, persistence: PersistenceCoordinator) -> Self {
        self.persistence = persistence;
        self
    }

    fn require_ready(&self) -> Result<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: SessionState::Ready.name(),
                actual: self.state.name(),
            })
        }
    }

    /// Load the trip from the store and enter `Ready`.
    ///
    /// A load failure or missing trip returns the session to `Idle`.
    pub async fn load(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidState {
                expected: SessionState::Idle.name(),
                actual: self.state.name(),
            });
        }
        self.state = SessionState::Loading;
        let record = match self.store.load_trip(&self.trip_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.state = SessionState::Idle;
                return Err(Error::InvalidInput(format!(
                    "no trip with id `{}`",
                    self.trip_id
                )));
            }
            Err(error) => {
                self.state = SessionState::Idle;
                return Err(error);
            }
        };
        let mut graph = record.graph();
        // Stored graphs from older writers may carry stale edges.
        let dropped = graph.retain_valid_edges();
        if dropped > 0 {
            warn!(trip_id = %self.trip_id, dropped, "repaired stored graph on load");
        }
        info!(trip_id = %self.trip_id, nodes = graph.nodes.len(), "trip loaded");
        self.graph = graph;
        self.record = Some(record);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Run the commit pipeline on a structurally mutated graph.
    ///
    /// The normalized structural state lands and is scheduled for saving
    /// before any distance lookup runs; enrichment is a second pass, so a
    /// slow routing backend never delays the commit itself.
    async fn commit(&mut self, mut candidate: ItineraryGraph) {
        candidate.retain_valid_edges();
        let normalized = renumber_days(candidate);
        for warning in &normalized.warnings {
            warn!(trip_id = %self.trip_id, %warning, "normalizer warning");
        }
        self.history.commit(&self.graph);
        self.graph = normalized.graph;
        self.persistence.schedule(&self.graph);

        self.graph = enrich_edges(std::mem::take(&mut self.graph), &*self.distances).await;
        self.persistence.schedule(&self.graph);
    }

    /// Send a user message to the assistant and commit any proposed graph.
    ///
    /// An assistant failure leaves graph, history, and conversation exactly
    /// as they were. A proposal with duplicate ids is rejected: the answer
    /// text is still returned, the graph is not replaced.
    pub async fn send_message(&mut self, query: impl Into<String>) -> Result<ChatOutcome> {
        self.require_ready()?;
        let query = query.into();

        let history_start = self.conversation.len().saturating_sub(HISTORY_WINDOW);
        let request = AssistantRequest::new(query.clone(), &self.graph)
            .with_history(self.conversation[history_start..].to_vec());
        let reply: AssistantReply = self.assistant.propose(&request).await?;

        self.conversation.push(ChatMessage::user(query));
        self.conversation
            .push(ChatMessage::assistant(reply.message.clone()));

        let Some(candidate) = reply.proposed_graph() else {
            return Ok(ChatOutcome {
                message: reply.message,
                graph_committed: false,
            });
        };

        if let Err(violation) = candidate.check_unique_ids() {
            warn!(trip_id = %self.trip_id, %violation, "rejected assistant graph");
            return Ok(ChatOutcome {
                message: reply.message,
                graph_committed: false,
            });
        }

        self.commit(candidate.clone()).await;
        Ok(ChatOutcome {
            message: reply.message,
            graph_committed: true,
        })
    }

    /// Apply a structural command batch.
    ///
    /// A batch that changes nothing (all no-ops or skipped commands) does
    /// not touch history or scheduling. Diagnostics are returned either way.
    pub async fn apply_commands(
        &mut self,
        commands: &[GraphCommand],
    ) -> Result<Vec<CommandDiagnostic>> {
        self.require_ready()?;
        let outcome = execute_commands(self.graph.clone(), commands);
        if !outcome.mutated {
            return Ok(outcome.diagnostics);
        }
        self.commit(outcome.graph).await;
        Ok(outcome.diagnostics)
    }

    /// Manually connect two existing nodes.
    ///
    /// Returns `Ok(false)` if the canonical edge already exists. Skips the
    /// normalizer (no nodes changed) and enriches only the new edge.
    pub async fn connect(&mut self, source: &str, target: &str) -> Result<bool> {
        self.require_ready()?;
        for endpoint in [source, target] {
            if self.graph.node(endpoint).is_none() {
                return Err(Error::InvalidInput(format!(
                    "cannot connect: node `{endpoint}` does not exist"
                )));
            }
        }
        let id = Edge::canonical_id(source, target);
        if self.graph.edge(&id).is_some() {
            return Ok(false);
        }

        self.history.commit(&self.graph);
        self.graph.edges.push(Edge::new(source, target));
        self.persistence.schedule(&self.graph);

        self.graph = enrich_edge(std::mem::take(&mut self.graph), &id, &*self.distances).await;
        self.persistence.schedule(&self.graph);
        Ok(true)
    }

    /// Step the graph back one commit. Returns whether anything changed.
    ///
    /// Restored states are exact: no renumbering, no re-enrichment. The
    /// restored graph is scheduled for saving like any other.
    pub fn undo(&mut self) -> Result<bool> {
        self.require_ready()?;
        let Some(restored) = self.history.undo(&self.graph) else {
            return Ok(false);
        };
        self.graph = restored;
        self.persistence.schedule(&self.graph);
        Ok(true)
    }

    /// Step the graph forward one commit. Returns whether anything changed.
    pub fn redo(&mut self) -> Result<bool> {
        self.require_ready()?;
        let Some(restored) = self.history.redo(&self.graph) else {
            return Ok(false);
        };
        self.graph = restored;
        self.persistence.schedule(&self.graph);
        Ok(true)
    }

    /// Write any pending save immediately. For teardown.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn graph(&self) -> &ItineraryGraph {
        &self.graph
    }

    /// Trip metadata from the loaded record.
    #[must_use]
    pub fn record(&self) -> Option<&TripRecord> {
        self.record.as_ref()
    }

    #[must_use]
    pub fn save_state(&self) -> SaveState {
        self.persistence.save_state()
    }

    /// Whether a save is queued behind the quiet window.
    #[must_use]
    pub fn has_queued_save(&self) -> bool {
        self.persistence.has_queued()
    }

    #[must_use]
    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}
