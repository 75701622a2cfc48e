//! The graph assistant seam.
//!
//! A [`GraphAssistant`] takes the user's message plus the complete current
//! graph and either answers conversationally or proposes a full replacement
//! graph. The engine never receives partial diffs from the assistant -
//! replacement is whole-graph, and the session controller validates and
//! repairs the candidate before committing it.
//!
//! `tripflow-openai` provides the production implementation; tests use
//! scripted replies from [`crate::test_support::ScriptedAssistant`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{Edge, ItineraryGraph, Node};

/// Who said a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior conversation turn, replayed to the assistant for context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Everything the assistant sees for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    /// The user's message, verbatim.
    pub query: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Recent turns, oldest first. Callers trim; providers replay as-is.
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

impl AssistantRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, graph: &ItineraryGraph) -> Self {
        Self {
            query: query.into(),
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
            conversation_history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.conversation_history = history;
        self
    }
}

/// The assistant's answer: a message, and optionally a replacement graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    /// Conversational text shown to the user.
    pub message: String,
    /// Whether `graph` carries a proposed replacement. A reply may set this
    /// false and still include a graph echo; the echo is ignored.
    pub graph_changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<ItineraryGraph>,
}

impl AssistantReply {
    /// A purely conversational reply.
    #[must_use]
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            graph_changed: false,
            graph: None,
        }
    }

    /// A reply proposing a replacement graph.
    #[must_use]
    pub fn replacement(message: impl Into<String>, graph: ItineraryGraph) -> Self {
        Self {
            message: message.into(),
            graph_changed: true,
            graph: Some(graph),
        }
    }

    /// The proposed graph, if this reply actually carries one.
    #[must_use]
    pub fn proposed_graph(&self) -> Option<&ItineraryGraph> {
        if self.graph_changed {
            self.graph.as_ref()
        } else {
            None
        }
    }
}

/// LLM seam: turn a request into a reply.
#[async_trait]
pub trait GraphAssistant: Send + Sync {
    async fn propose(&self, request: &AssistantRequest) -> Result<AssistantReply>;
}
