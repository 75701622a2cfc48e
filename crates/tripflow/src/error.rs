//! Error types for TripFlow operations.
//!
//! Leaf components (command executor, normalizer, enricher) never error
//! across the session-controller boundary - they return degraded results
//! plus diagnostics. The `Error` enum here covers the failures that do
//! surface: collaborator failures, rejected replacements, bad inputs, and
//! calls made in the wrong session state.
//!
//! Use [`Error::category`] when the handling strategy depends on the class
//! of failure rather than the exact variant (e.g. "was this the user's
//! input or an external service?").

use thiserror::Error;

use crate::graph::GraphViolation;

/// Result type alias for TripFlow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error category for systematic handling and reporting.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input or a rejected graph (caller can fix the request).
    Validation,
    /// An external collaborator failed (assistant or distance provider).
    /// The in-memory graph is untouched; retrying is reasonable.
    External,
    /// The persistence store failed. The next debounced save is the
    /// implicit retry path.
    Storage,
    /// A payload could not be (de)serialized.
    Serialization,
    /// An operation was invoked in the wrong session state.
    State,
}

/// Error type for TripFlow operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid input from the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A produced or received graph violates a model invariant.
    #[error(transparent)]
    Graph(#[from] GraphViolation),

    /// The graph assistant (LLM collaborator) failed.
    #[error("assistant error: {0}")]
    Assistant(String),

    /// The distance provider failed in a way that was not degradable.
    #[error("distance provider error: {0}")]
    Distance(String),

    /// The trip store failed to load or save.
    #[error("store error: {0}")]
    Store(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation was called in the wrong session state.
    #[error("invalid session state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Error {
    /// Map this error onto its handling category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_) | Error::Graph(_) => ErrorCategory::Validation,
            Error::Assistant(_) | Error::Distance(_) => ErrorCategory::External,
            Error::Store(_) => ErrorCategory::Storage,
            Error::Serialization(_) => ErrorCategory::Serialization,
            Error::InvalidState { .. } => ErrorCategory::State,
        }
    }
}
