//! # TripFlow
//!
//! An itinerary graph synchronization engine: the state-keeping core of an
//! AI-assisted trip planner. The itinerary is a graph of day-indexed stops
//! connected by travel segments; an LLM assistant proposes whole-graph
//! replacements, a command executor applies structured edits, and the
//! engine keeps the result consistent, undoable, and durably saved.
//!
//! ## Architecture
//!
//! * [`graph`] - the graph model and its invariants
//! * [`command`] - structured mutation commands and their executor
//! * [`normalize`] - day/ID renumbering after structural edits
//! * [`distance`] - concurrent distance enrichment of travel segments
//! * [`assistant`] - the LLM seam (whole-graph proposals)
//! * [`history`] - linear undo/redo over graph snapshots
//! * [`persist`] - trip storage and debounced save coordination
//! * [`session`] - the controller state machine that owns the live graph
//! * [`test_support`] - deterministic doubles for the three seams
//!
//! External collaborators (the assistant, the distance backend, the store)
//! are traits; production implementations live in companion crates
//! (`tripflow-openai`, `tripflow-google-maps`).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tripflow::session::SessionController;
//! use tripflow::test_support::{InMemoryTripStore, ScriptedAssistant, StaticDistances};
//!
//! # async fn run() -> tripflow::Result<()> {
//! let mut session = SessionController::new(
//!     "trip-1",
//!     Arc::new(ScriptedAssistant::new()),
//!     Arc::new(StaticDistances::new()),
//!     Arc::new(InMemoryTripStore::new()),
//! );
//! session.load().await?;
//! let outcome = session.send_message("add a day in Jaipur").await?;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod command;
pub mod distance;
pub mod error;
pub mod graph;
pub mod history;
pub mod normalize;
pub mod persist;
pub mod session;
pub mod test_support;

pub use error::{Error, ErrorCategory, Result};
pub use graph::{Coordinates, Edge, ItineraryGraph, Node};
pub use session::{SessionController, SessionState};
