//! Linear undo/redo history over graph snapshots.
//!
//! The history stores full structural snapshots, not diffs. Undo and redo
//! swap the live graph with the adjacent snapshot, so walking back and
//! forward reproduces every intermediate state exactly. A commit while
//! undone truncates the redo tail - history is strictly linear, no
//! branches.
//!
//! Snapshots are structural only: the caller snapshots the pre-commit
//! graph, including any distance labels it carried at that moment, and
//! restoration does not re-trigger enrichment.

use crate::graph::{Edge, ItineraryGraph, Node};

/// A stored graph state.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl From<&ItineraryGraph> for GraphSnapshot {
    fn from(graph: &ItineraryGraph) -> Self {
        Self {
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
        }
    }
}

impl From<GraphSnapshot> for ItineraryGraph {
    fn from(snapshot: GraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
        }
    }
}

/// Linear history. The live graph lives outside; `cursor` points at the
/// snapshot the live graph would swap with on undo.
#[derive(Debug, Default)]
pub struct GraphHistory {
    entries: Vec<GraphSnapshot>,
    cursor: Option<usize>,
}

impl GraphHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state being replaced by a new commit.
    ///
    /// Call with the graph as it was *before* the mutation. Any redo tail
    /// beyond the cursor is discarded.
    pub fn commit(&mut self, previous: &ItineraryGraph) {
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        self.entries.push(GraphSnapshot::from(previous));
        self.cursor = Some(self.entries.len() - 1);
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        match self.cursor {
            None => !self.entries.is_empty(),
            Some(cursor) => cursor + 1 < self.entries.len(),
        }
    }

    /// Step back: swap the live graph with the snapshot under the cursor.
    ///
    /// Returns the restored graph, or `None` at the beginning of history
    /// (the live graph is untouched in that case).
    pub fn undo(&mut self, live: &ItineraryGraph) -> Option<ItineraryGraph> {
        let cursor = self.cursor?;
        let restored = std::mem::replace(&mut self.entries[cursor], GraphSnapshot::from(live));
        self.cursor = cursor.checked_sub(1);
        Some(restored.into())
    }

    /// Step forward: swap the live graph with the next snapshot.
    ///
    /// Returns the restored graph, or `None` at the end of history.
    pub fn redo(&mut self, live: &ItineraryGraph) -> Option<ItineraryGraph> {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        if next >= self.entries.len() {
            return None;
        }
        let restored = std::mem::replace(&mut self.entries[next], GraphSnapshot::from(live));
        self.cursor = Some(next);
        Some(restored.into())
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
