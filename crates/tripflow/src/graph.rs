//! The itinerary graph data model.
//!
//! An [`ItineraryGraph`] is an ordered sequence of [`Node`]s (stops) and
//! [`Edge`]s (travel segments) in the shape the store and the assistant
//! exchange: camelCase JSON with node payload fields nested under `data`.
//!
//! Every component that produces a graph guarantees three invariants:
//!
//! 1. Node ids are unique.
//! 2. Edge ids are unique.
//! 3. Every edge's `source`/`target` refers to an existing node id.
//!
//! A violation of (3) is recoverable - [`ItineraryGraph::retain_valid_edges`]
//! drops the offending edges instead of committing a dangling reference.
//! Day-indexed graphs carry a fourth invariant, enforced by the normalizer
//! (see [`crate::normalize`]): when a node has `day` set, its id equals the
//! decimal string of that day, and day numbers run 1..=N with no gaps.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// 2D canvas coordinate. UI layout only - never a correctness invariant, and
/// never recalculated for nodes that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Default placement for a node appended to a graph that already has
    /// `existing` nodes: `{x: 250, y: existing * 150}`.
    #[must_use]
    pub fn for_new_node(existing: usize) -> Self {
        Self {
            x: 250.0,
            y: existing as f64 * 150.0,
        }
    }
}

/// Geographic point. Required on both endpoints for distance enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Nested cost record, e.g. `{"accommodation": "$120", "total": "$310"}`.
///
/// Entries are label → display amount; the engine never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    #[serde(flatten)]
    pub entries: BTreeMap<String, String>,
}

/// One value in a node's open descriptive bag.
///
/// The bag is loosely typed at the wire level (the assistant may attach
/// arbitrary descriptive fields), but the engine confines it to a closed set
/// of variants. JSON shapes outside that set degrade to [`FieldValue::Text`]
/// of their JSON rendering rather than being dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Plain display text (`"info"`, `"googleMapsLink"`, `"duration"`, …).
    Text(String),
    /// List of display strings (`"activities"`, `"tips"`, …).
    TextList(Vec<String>),
    /// Labeled cost amounts (`"estimatedCost"`).
    Cost(CostBreakdown),
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(text) => FieldValue::Text(text),
            Value::Array(items) if items.iter().all(Value::is_string) => FieldValue::TextList(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Object(map) if map.values().all(Value::is_string) => {
                FieldValue::Cost(CostBreakdown {
                    entries: map
                        .into_iter()
                        .filter_map(|(key, item)| match item {
                            Value::String(text) => Some((key, text)),
                            _ => None,
                        })
                        .collect(),
                })
            }
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(FieldValue::from(serde_json::Value::deserialize(
            deserializer,
        )?))
    }
}

/// Node payload, nested under `data` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Display name of the stop. Non-empty.
    pub label: String,

    /// Day number within the itinerary. When present, the owning node's id
    /// must equal `day.to_string()` and days run 1..=N contiguously.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,

    /// Geographic position, when known. Both endpoints of an edge need one
    /// for the edge to receive a distance label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    /// Open bag of descriptive fields (info, activities, accommodation,
    /// estimatedCost, tips, …). Opaque to the engine; preserved verbatim
    /// across mutation unless explicitly targeted by `update_node`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

fn default_node_type() -> String {
    "custom".to_string()
}

/// One physical stop on the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,

    /// Renderer hint, `"custom"` unless the wire says otherwise.
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,

    #[serde(default)]
    pub position: Position,

    pub data: NodeData,
}

impl Node {
    /// Create a node with the default type and position.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: default_node_type(),
            position: Position::default(),
            data: NodeData {
                label: label.into(),
                day: None,
                coordinates: None,
                extra: BTreeMap::new(),
            },
        }
    }

    #[must_use]
    pub fn with_day(mut self, day: u32) -> Self {
        self.data.day = Some(day);
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.data.coordinates = Some(Coordinates { lat, lng });
        self
    }
}

/// Edge payload. Currently only the computed distance caption.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeData {
    /// Display text set by the distance enricher, e.g. `"233.21 km"`.
    /// Overwritten on re-enrichment, never merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

impl EdgeData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.distance.is_none()
    }
}

fn default_edge_type() -> String {
    "smoothstep".to_string()
}

/// A directed travel segment between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,

    /// Id of the node this segment departs from. Must exist in any
    /// committed graph.
    pub source: String,

    /// Id of the node this segment arrives at. Must exist in any
    /// committed graph.
    pub target: String,

    /// Display caption, typically the computed distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,

    #[serde(default)]
    pub animated: bool,

    #[serde(default, skip_serializing_if = "EdgeData::is_empty")]
    pub data: EdgeData,
}

impl Edge {
    /// Create an edge with the canonical id and default type.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Edge::canonical_id(&source, &target),
            source,
            target,
            label: None,
            edge_type: default_edge_type(),
            animated: false,
            data: EdgeData::default(),
        }
    }

    /// Canonical edge id: `"e{source}-{target}"`.
    #[must_use]
    pub fn canonical_id(source: &str, target: &str) -> String {
        format!("e{source}-{target}")
    }
}

/// An invariant violation detected in a produced graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GraphViolation {
    #[error("duplicate node id `{0}`")]
    DuplicateNodeId(String),

    #[error("duplicate edge id `{0}`")]
    DuplicateEdgeId(String),

    #[error("edge `{edge}` references missing node `{node}`")]
    DanglingEdge { edge: String, node: String },

    #[error("node `{id}` carries day {day} but its id is not `{day}`")]
    DayIdMismatch { id: String, day: u32 },

    #[error("day numbers are not contiguous from 1: {days:?}")]
    NonContiguousDays { days: Vec<u32> },

    #[error("node `{0}` has an empty label")]
    EmptyLabel(String),
}

/// The graph: ordered nodes plus ordered edges.
///
/// Owned exclusively by the session controller at any instant. Every other
/// component receives it by value and returns a new graph - nothing mutates
/// a graph it shares with another owner.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItineraryGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ItineraryGraph {
    #[must_use]
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    #[must_use]
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    /// Find a node by label: case-insensitive substring match, first hit.
    ///
    /// This is intentionally lossy - "Del" matches "Delhi" and, with several
    /// candidates, whichever appears first in node order wins. Callers that
    /// resolve a command through this lookup record the matched id in their
    /// diagnostics so the ambiguity is observable.
    #[must_use]
    pub fn find_node_by_label(&self, label: &str) -> Option<&Node> {
        let needle = label.to_lowercase();
        self.nodes
            .iter()
            .find(|node| node.data.label.to_lowercase().contains(&needle))
    }

    /// Check id uniqueness only - the subset of [`validate`](Self::validate)
    /// that is never repairable. Used to gate assistant replacements.
    pub fn check_unique_ids(&self) -> Result<(), GraphViolation> {
        let mut node_ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(GraphViolation::DuplicateNodeId(node.id.clone()));
            }
        }
        let mut edge_ids = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphViolation::DuplicateEdgeId(edge.id.clone()));
            }
        }
        Ok(())
    }

    /// Validate all graph invariants: id uniqueness, referential integrity,
    /// non-empty labels, day/id agreement, and day contiguity from 1.
    pub fn validate(&self) -> Result<(), GraphViolation> {
        self.check_unique_ids()?;

        for node in &self.nodes {
            if node.data.label.trim().is_empty() {
                return Err(GraphViolation::EmptyLabel(node.id.clone()));
            }
            if let Some(day) = node.data.day {
                if node.id != day.to_string() {
                    return Err(GraphViolation::DayIdMismatch {
                        id: node.id.clone(),
                        day,
                    });
                }
            }
        }

        let mut days: Vec<u32> = self.nodes.iter().filter_map(|node| node.data.day).collect();
        days.sort_unstable();
        if !days.is_empty() && days.iter().enumerate().any(|(i, &day)| day != i as u32 + 1) {
            return Err(GraphViolation::NonContiguousDays { days });
        }

        let node_ids: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(GraphViolation::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Drop edges whose `source` or `target` does not resolve to a node.
    ///
    /// Returns the number of edges dropped. Each drop is logged at warn -
    /// a dangling edge is a recoverable producer bug, not a reason to
    /// abandon the graph.
    pub fn retain_valid_edges(&mut self) -> usize {
        let node_ids: HashSet<String> = self.nodes.iter().map(|node| node.id.clone()).collect();
        let before = self.edges.len();
        self.edges.retain(|edge| {
            let keep = node_ids.contains(&edge.source) && node_ids.contains(&edge.target);
            if !keep {
                warn!(
                    edge = %edge.id,
                    source = %edge.source,
                    target = %edge.target,
                    "dropping edge with dangling endpoint"
                );
            }
            keep
        });
        before - self.edges.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day_node(day: u32, label: &str) -> Node {
        Node::new(day.to_string(), label).with_day(day)
    }

    #[test]
    fn validate_accepts_well_formed_graph() {
        let graph = ItineraryGraph::new(
            vec![day_node(1, "Delhi"), day_node(2, "Agra")],
            vec![Edge::new("1", "2")],
        );
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_node_ids() {
        let graph = ItineraryGraph::new(
            vec![Node::new("1", "Delhi"), Node::new("1", "Agra")],
            vec![],
        );
        assert_eq!(
            graph.validate(),
            Err(GraphViolation::DuplicateNodeId("1".to_string()))
        );
    }

    #[test]
    fn validate_rejects_day_id_mismatch() {
        let graph = ItineraryGraph::new(vec![Node::new("a", "Delhi").with_day(1)], vec![]);
        assert_eq!(
            graph.validate(),
            Err(GraphViolation::DayIdMismatch {
                id: "a".to_string(),
                day: 1
            })
        );
    }

    #[test]
    fn validate_rejects_day_gap() {
        let graph = ItineraryGraph::new(vec![day_node(1, "Delhi"), day_node(3, "Jaipur")], vec![]);
        assert!(matches!(
            graph.validate(),
            Err(GraphViolation::NonContiguousDays { .. })
        ));
    }

    #[test]
    fn validate_rejects_dangling_edge() {
        let graph = ItineraryGraph::new(vec![day_node(1, "Delhi")], vec![Edge::new("1", "9")]);
        assert_eq!(
            graph.validate(),
            Err(GraphViolation::DanglingEdge {
                edge: "e1-9".to_string(),
                node: "9".to_string()
            })
        );
    }

    #[test]
    fn retain_valid_edges_drops_only_dangling() {
        let mut graph = ItineraryGraph::new(
            vec![day_node(1, "Delhi"), day_node(2, "Agra")],
            vec![Edge::new("1", "2"), Edge::new("2", "9")],
        );
        assert_eq!(graph.retain_valid_edges(), 1);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "e1-2");
    }

    #[test]
    fn label_lookup_is_case_insensitive_substring_first_match() {
        let graph = ItineraryGraph::new(
            vec![
                Node::new("1", "New Delhi"),
                Node::new("2", "Old Delhi Market"),
            ],
            vec![],
        );
        let hit = graph.find_node_by_label("delhi").map(|node| node.id.as_str());
        assert_eq!(hit, Some("1"));
        assert!(graph.find_node_by_label("jaipur").is_none());
    }

    #[test]
    fn canonical_edge_id_format() {
        assert_eq!(Edge::canonical_id("1", "2"), "e1-2");
        assert_eq!(Edge::new("3", "4").id, "e3-4");
    }

    #[test]
    fn default_position_steps_by_node_count() {
        let position = Position::for_new_node(3);
        assert_eq!(position.x, 250.0);
        assert_eq!(position.y, 450.0);
    }

    #[test]
    fn node_data_round_trips_open_bag() {
        let json = serde_json::json!({
            "id": "1",
            "type": "custom",
            "position": {"x": 250.0, "y": 150.0},
            "data": {
                "label": "Delhi",
                "day": 1,
                "info": "Capital territory",
                "activities": ["Red Fort", "Qutub Minar"],
                "estimatedCost": {"hotel": "$90", "total": "$140"}
            }
        });
        let node: Node = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(node.data.day, Some(1));
        assert_eq!(
            node.data.extra.get("info"),
            Some(&FieldValue::Text("Capital territory".to_string()))
        );
        assert!(matches!(
            node.data.extra.get("activities"),
            Some(FieldValue::TextList(items)) if items.len() == 2
        ));
        assert!(matches!(
            node.data.extra.get("estimatedCost"),
            Some(FieldValue::Cost(_))
        ));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn unknown_bag_shapes_degrade_to_text() {
        let value = FieldValue::from(serde_json::json!(42));
        assert_eq!(value, FieldValue::Text("42".to_string()));
        let value = FieldValue::from(serde_json::json!([1, 2]));
        assert_eq!(value, FieldValue::Text("[1,2]".to_string()));
    }
}
