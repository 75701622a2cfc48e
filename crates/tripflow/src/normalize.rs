//! Day/ID normalizer.
//!
//! Day-indexed nodes carry the invariant that a node's id equals the
//! decimal string of its day and days run 1..=N with no gaps. Structural
//! edits break this freely (removing day 2 of 4 leaves days 1, 3, 4);
//! [`renumber_days`] repairs the numbering before a graph is committed.
//!
//! Nodes without a `day` are left completely untouched, as are all
//! positions. Edge endpoints and canonical edge ids are rewritten to track
//! the renumbered nodes.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::graph::{Edge, ItineraryGraph};

/// One node id rewrite performed by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRemap {
    pub old_id: String,
    pub new_id: String,
    pub new_day: u32,
}

/// Result of a normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub graph: ItineraryGraph,
    /// Every id rewrite applied, in new-day order. Empty when the graph was
    /// already normalized.
    pub remapped: Vec<IdRemap>,
    /// Human-readable notes about anomalies the pass worked around.
    pub warnings: Vec<String>,
}

/// Renumber day-indexed nodes sequentially from 1, preserving day order.
///
/// Node ids become the new day strings, edge endpoints follow, and edges
/// whose id was canonical for their old endpoints get the canonical id for
/// the new ones. Non-day nodes and positions pass through unchanged, except
/// that a non-day node holding an id the new numbering claims is moved to a
/// fresh id (with a warning) so the result never carries duplicates. Ties
/// on the same day number keep their relative node order (stable sort).
#[must_use]
pub fn renumber_days(graph: ItineraryGraph) -> NormalizeOutcome {
    let mut warnings = Vec::new();

    let has_day_nodes = graph.nodes.iter().any(|node| node.data.day.is_some());
    if !has_day_nodes {
        return NormalizeOutcome {
            graph,
            remapped: Vec::new(),
            warnings,
        };
    }

    let ItineraryGraph { mut nodes, edges } = graph;

    let mut remapped = Vec::new();
    let mut id_map: HashMap<String, String> = HashMap::new();

    // Ids "1"..="N" belong to the day numbering. A non-day node holding
    // one of them moves aside first, edges following the rename.
    let day_count = nodes.iter().filter(|node| node.data.day.is_some()).count();
    let reserved: HashSet<String> = (1..=day_count).map(|day| day.to_string()).collect();
    let mut taken: HashSet<String> = nodes.iter().map(|node| node.id.clone()).collect();
    for node in &mut nodes {
        if node.data.day.is_some() || !reserved.contains(&node.id) {
            continue;
        }
        let mut suffix = 2;
        let mut new_id = format!("{}-{suffix}", node.id);
        while taken.contains(&new_id) {
            suffix += 1;
            new_id = format!("{}-{suffix}", node.id);
        }
        taken.insert(new_id.clone());
        warnings.push(format!(
            "node id `{}` collides with the day numbering; moved to `{new_id}`",
            node.id
        ));
        warn!(old_id = %node.id, %new_id, "non-day node id collides with day numbering");
        id_map.insert(node.id.clone(), new_id.clone());
        node.id = new_id;
    }

    // Stable sort: day-indexed nodes in day order, everything else keeps
    // its position relative to them as a trailing group.
    nodes.sort_by_key(|node| node.data.day.unwrap_or(u32::MAX));

    let mut next_day: u32 = 0;
    for node in &mut nodes {
        if node.data.day.is_none() {
            continue;
        }
        next_day += 1;
        let new_id = next_day.to_string();
        if node.id != new_id || node.data.day != Some(next_day) {
            remapped.push(IdRemap {
                old_id: node.id.clone(),
                new_id: new_id.clone(),
                new_day: next_day,
            });
            if let Some(shadowed) = id_map.insert(node.id.clone(), new_id.clone()) {
                // Two nodes entered with the same id. Last write wins in the
                // edge remap; committed graphs never reach here because
                // duplicate ids are rejected upstream.
                warnings.push(format!(
                    "duplicate node id `{}` during renumber; edges follow `{new_id}`, not `{shadowed}`",
                    node.id
                ));
                warn!(old_id = %node.id, "duplicate node id during day renumbering");
            }
            node.id = new_id;
            node.data.day = Some(next_day);
        }
    }

    let edges = edges
        .into_iter()
        .map(|mut edge| {
            let was_canonical = edge.id == Edge::canonical_id(&edge.source, &edge.target);
            if let Some(new_source) = id_map.get(&edge.source) {
                edge.source = new_source.clone();
            }
            if let Some(new_target) = id_map.get(&edge.target) {
                edge.target = new_target.clone();
            }
            // Only canonical ids track the rename; hand-assigned ids are
            // someone else's reference and stay put.
            if was_canonical {
                edge.id = Edge::canonical_id(&edge.source, &edge.target);
            }
            edge
        })
        .collect();

    if !remapped.is_empty() {
        debug!(rewrites = remapped.len(), "renumbered itinerary days");
    }

    NormalizeOutcome {
        graph: ItineraryGraph { nodes, edges },
        remapped,
        warnings,
    }
}
