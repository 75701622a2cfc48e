//! Structured graph mutation commands and their executor.
//!
//! A [`GraphCommand`] is the wire-level mutation unit: a tagged
//! `{type, payload}` object with one of seven tags. Payload fields are
//! optional at the wire level; required-field checks happen at execution
//! time so that one malformed command skips itself instead of failing the
//! whole batch.
//!
//! [`execute_commands`] folds a batch over a graph strictly in sequence -
//! each command's output graph is the next command's input, so later
//! commands may reference nodes and edges created earlier in the same
//! batch. No command ever aborts the batch; problems are recorded as
//! [`CommandDiagnostic`]s and execution continues.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::graph::{Coordinates, Edge, FieldValue, ItineraryGraph, Node, Position};

/// Payload for `add_node`. `id` and `label` are required at execution time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNodePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Any further descriptive fields land in the node's open bag.
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

/// Node selector used by `remove_node` and `update_node`: an exact id, or
/// a label fragment resolved via case-insensitive substring / first match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NodeSelector {
    /// Resolve the selector to a node id, id taking precedence over label.
    fn resolve(&self, graph: &ItineraryGraph) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }
        self.label
            .as_deref()
            .and_then(|label| graph.find_node_by_label(label))
            .map(|node| node.id.clone())
    }
}

/// Payload for `add_edge`. `source` and `target` are required at execution
/// time; `id` defaults to the canonical `"e{source}-{target}"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddEdgePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
}

/// Payload for `remove_edge`: exact id match, or exact source+target pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoveEdgePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Payload for `update_node`: a selector plus a shallow `updates` object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateNodePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Payload for `update_edge`: exact id plus a shallow `updates` object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateEdgePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One structural mutation command, as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GraphCommand {
    AddNode(AddNodePayload),
    RemoveNode(NodeSelector),
    AddEdge(AddEdgePayload),
    RemoveEdge(RemoveEdgePayload),
    UpdateNode(UpdateNodePayload),
    UpdateEdge(UpdateEdgePayload),
    /// Explicit no-op, used when a batch has nothing to apply.
    #[serde(rename = "none")]
    Noop,
}

impl GraphCommand {
    /// The wire tag, for diagnostics.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            GraphCommand::AddNode(_) => "add_node",
            GraphCommand::RemoveNode(_) => "remove_node",
            GraphCommand::AddEdge(_) => "add_edge",
            GraphCommand::RemoveEdge(_) => "remove_edge",
            GraphCommand::UpdateNode(_) => "update_node",
            GraphCommand::UpdateEdge(_) => "update_edge",
            GraphCommand::Noop => "none",
        }
    }
}

/// How bad a skipped or degraded command was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// Expected no-op (duplicate id, unresolved selector).
    Warning,
    /// Malformed payload - the command could not be interpreted.
    Error,
}

/// A record of a command that could not be applied as written.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDiagnostic {
    /// Position of the command within the batch.
    pub index: usize,
    /// Wire tag of the command.
    pub command: &'static str,
    pub severity: DiagnosticSeverity,
    pub detail: String,
}

/// Result of folding a command batch over a graph.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The graph after all applicable commands.
    pub graph: ItineraryGraph,
    /// One entry per skipped or degraded command.
    pub diagnostics: Vec<CommandDiagnostic>,
    /// Whether any command actually changed the graph.
    pub mutated: bool,
}

struct Executor {
    graph: ItineraryGraph,
    diagnostics: Vec<CommandDiagnostic>,
    mutated: bool,
}

impl Executor {
    fn warn(&mut self, index: usize, command: &'static str, detail: String) {
        warn!(index, command, %detail, "graph command skipped");
        self.diagnostics.push(CommandDiagnostic {
            index,
            command,
            severity: DiagnosticSeverity::Warning,
            detail,
        });
    }

    fn error(&mut self, index: usize, command: &'static str, detail: String) {
        error!(index, command, %detail, "malformed graph command skipped");
        self.diagnostics.push(CommandDiagnostic {
            index,
            command,
            severity: DiagnosticSeverity::Error,
            detail,
        });
    }

    fn add_node(&mut self, index: usize, payload: &AddNodePayload) {
        let (Some(id), Some(label)) = (payload.id.clone(), payload.label.clone()) else {
            self.error(index, "add_node", "payload requires id and label".to_string());
            return;
        };
        if self.graph.node(&id).is_some() {
            self.warn(index, "add_node", format!("node `{id}` already exists"));
            return;
        }
        let mut node = Node::new(id, label).with_position(
            payload
                .position
                .unwrap_or_else(|| Position::for_new_node(self.graph.nodes.len())),
        );
        node.data.day = payload.day;
        node.data.coordinates = payload.coordinates;
        node.data.extra = payload.extra.clone();
        self.graph.nodes.push(node);
        self.mutated = true;
    }

    fn remove_node(&mut self, index: usize, selector: &NodeSelector) {
        if selector.id.is_none() && selector.label.is_none() {
            self.error(index, "remove_node", "payload requires id or label".to_string());
            return;
        }
        let Some(id) = selector.resolve(&self.graph) else {
            self.warn(
                index,
                "remove_node",
                format!("no node matched selector {selector:?}"),
            );
            return;
        };
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|node| node.id != id);
        if self.graph.nodes.len() == before {
            self.warn(index, "remove_node", format!("node `{id}` not found"));
            return;
        }
        // Cascade: every edge touching the node goes with it.
        self.graph
            .edges
            .retain(|edge| edge.source != id && edge.target != id);
        self.mutated = true;
    }

    fn add_edge(&mut self, index: usize, payload: &AddEdgePayload) {
        let (Some(source), Some(target)) = (payload.source.clone(), payload.target.clone()) else {
            self.error(
                index,
                "add_edge",
                "payload requires source and target".to_string(),
            );
            return;
        };
        let id = payload
            .id
            .clone()
            .unwrap_or_else(|| Edge::canonical_id(&source, &target));
        if self.graph.edge(&id).is_some() {
            self.warn(index, "add_edge", format!("edge `{id}` already exists"));
            return;
        }
        // Endpoint existence is deliberately not checked here; the invariant
        // pass before commit drops dangling edges.
        let mut edge = Edge::new(source, target);
        edge.id = id;
        edge.label = payload.label.clone();
        if let Some(edge_type) = &payload.edge_type {
            edge.edge_type = edge_type.clone();
        }
        self.graph.edges.push(edge);
        self.mutated = true;
    }

    fn remove_edge(&mut self, index: usize, payload: &RemoveEdgePayload) {
        let before = self.graph.edges.len();
        if let Some(id) = &payload.id {
            self.graph.edges.retain(|edge| edge.id != *id);
        } else if let (Some(source), Some(target)) = (&payload.source, &payload.target) {
            self.graph
                .edges
                .retain(|edge| !(edge.source == *source && edge.target == *target));
        } else {
            self.error(
                index,
                "remove_edge",
                "payload requires id, or source and target".to_string(),
            );
            return;
        }
        if self.graph.edges.len() == before {
            self.warn(index, "remove_edge", format!("no edge matched {payload:?}"));
        } else {
            self.mutated = true;
        }
    }

    fn update_node(&mut self, index: usize, payload: &UpdateNodePayload) {
        let selector = NodeSelector {
            id: payload.id.clone(),
            label: payload.label.clone(),
        };
        let resolved = selector.resolve(&self.graph);
        let (Some(id), Some(updates)) = (resolved, payload.updates.as_ref()) else {
            self.error(
                index,
                "update_node",
                format!("unresolved node or missing updates: {payload:?}"),
            );
            return;
        };
        let Some(node) = self.graph.node_mut(&id) else {
            self.warn(index, "update_node", format!("node `{id}` not found"));
            return;
        };
        // Shallow merge: recognized typed fields first, everything else
        // into the open bag. New keys overwrite, others are preserved.
        for (key, value) in updates {
            match (key.as_str(), value) {
                ("label", serde_json::Value::String(label)) => {
                    node.data.label = label.clone();
                }
                ("day", serde_json::Value::Number(day)) => {
                    node.data.day = day.as_u64().and_then(|d| u32::try_from(d).ok());
                }
                ("day", serde_json::Value::Null) => {
                    node.data.day = None;
                }
                ("coordinates", value) => {
                    node.data.coordinates = serde_json::from_value(value.clone()).ok();
                }
                (_, value) => {
                    node.data
                        .extra
                        .insert(key.clone(), FieldValue::from(value.clone()));
                }
            }
        }
        self.mutated = true;
    }

    fn update_edge(&mut self, index: usize, payload: &UpdateEdgePayload) {
        let (Some(id), Some(updates)) = (payload.id.as_ref(), payload.updates.as_ref()) else {
            self.error(
                index,
                "update_edge",
                "payload requires id and updates".to_string(),
            );
            return;
        };
        let Some(edge) = self.graph.edges.iter_mut().find(|edge| edge.id == *id) else {
            self.warn(index, "update_edge", format!("edge `{id}` not found"));
            return;
        };
        let mut applied = false;
        let mut unknown = Vec::new();
        // Shallow merge into the edge record itself (not nested under data).
        for (key, value) in updates {
            match (key.as_str(), value) {
                ("label", serde_json::Value::String(label)) => {
                    edge.label = Some(label.clone());
                    applied = true;
                }
                ("label", serde_json::Value::Null) => {
                    edge.label = None;
                    applied = true;
                }
                ("type", serde_json::Value::String(edge_type)) => {
                    edge.edge_type = edge_type.clone();
                    applied = true;
                }
                ("animated", serde_json::Value::Bool(animated)) => {
                    edge.animated = *animated;
                    applied = true;
                }
                ("source", serde_json::Value::String(source)) => {
                    edge.source = source.clone();
                    applied = true;
                }
                ("target", serde_json::Value::String(target)) => {
                    edge.target = target.clone();
                    applied = true;
                }
                _ => unknown.push(key.clone()),
            }
        }
        if applied {
            self.mutated = true;
        }
        if !unknown.is_empty() {
            self.warn(
                index,
                "update_edge",
                format!("ignored unrecognized edge fields: {unknown:?}"),
            );
        }
    }
}

/// Apply a batch of commands to a graph, strictly in sequence.
///
/// Never fails: malformed or unresolvable commands are skipped with a
/// diagnostic and the fold continues with the remaining commands.
#[must_use]
pub fn execute_commands(graph: ItineraryGraph, commands: &[GraphCommand]) -> CommandOutcome {
    let mut executor = Executor {
        graph,
        diagnostics: Vec::new(),
        mutated: false,
    };
    for (index, command) in commands.iter().enumerate() {
        match command {
            GraphCommand::AddNode(payload) => executor.add_node(index, payload),
            GraphCommand::RemoveNode(selector) => executor.remove_node(index, selector),
            GraphCommand::AddEdge(payload) => executor.add_edge(index, payload),
            GraphCommand::RemoveEdge(payload) => executor.remove_edge(index, payload),
            GraphCommand::UpdateNode(payload) => executor.update_node(index, payload),
            GraphCommand::UpdateEdge(payload) => executor.update_edge(index, payload),
            GraphCommand::Noop => {}
        }
    }
    CommandOutcome {
        graph: executor.graph,
        diagnostics: executor.diagnostics,
        mutated: executor.mutated,
    }
}
