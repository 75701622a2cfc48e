//! OpenAI integration for TripFlow
//!
//! This crate provides [`OpenAiGraphAssistant`], an implementation of
//! [`tripflow::assistant::GraphAssistant`] backed by the OpenAI chat
//! completions API with structured (JSON schema) output. The model receives
//! the complete current graph plus recent conversation turns, and answers
//! with a message and, when the user asked for a change, a full replacement
//! graph.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tripflow_openai::OpenAiGraphAssistant;
//! use tripflow::assistant::{AssistantRequest, GraphAssistant};
//!
//! #[tokio::main]
//! async fn main() -> tripflow::Result<()> {
//!     // Uses the OPENAI_API_KEY env var
//!     let assistant = OpenAiGraphAssistant::from_env()?
//!         .with_model("gpt-4o");
//!
//!     let request = AssistantRequest::new("add a day in Jaipur", &graph);
//!     let reply = assistant.propose(&request).await?;
//!     println!("{}", reply.message);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use tripflow::assistant::{AssistantReply, AssistantRequest, ChatRole, GraphAssistant};
use tripflow::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = "\
You are a travel planning assistant that maintains an itinerary graph. \
Nodes are stops with day numbers; edges are travel segments between them. \
When the user asks a question, answer it and set graphChanged to false. \
When the user asks for a change, return the COMPLETE updated graph and set \
graphChanged to true. Rules for the updated graph: every day-numbered \
node's id MUST equal its day number as a string; after removing a day, \
renumber the remaining days sequentially starting from 1 and update all \
edge source/target references to the new ids; NEVER change the position of \
a node that already exists; preserve all descriptive fields you are not \
asked to change.";

/// Graph assistant backed by the OpenAI chat completions API.
pub struct OpenAiGraphAssistant {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGraphAssistant {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Build from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::InvalidInput("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (e.g. for a proxy or a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, request: &AssistantRequest) -> Result<serde_json::Value> {
        let mut messages = vec![json!({"role": "system", "content": SYSTEM_PROMPT})];
        for turn in &request.conversation_history {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": turn.text}));
        }
        let graph_json = serde_json::to_string(&json!({
            "nodes": request.nodes,
            "edges": request.edges,
        }))?;
        messages.push(json!({
            "role": "user",
            "content": format!("Current itinerary graph:\n{graph_json}\n\nUser request: {}", request.query),
        }));

        Ok(json!({
            "model": self.model,
            "messages": messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "itinerary_reply",
                    "schema": reply_schema(),
                }
            }
        }))
    }
}

/// JSON schema the model's reply must satisfy: mirrors [`AssistantReply`].
fn reply_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "message": {"type": "string"},
            "graphChanged": {"type": "boolean"},
            "graph": {
                "type": "object",
                "properties": {
                    "nodes": {"type": "array"},
                    "edges": {"type": "array"}
                },
                "required": ["nodes", "edges"]
            }
        },
        "required": ["message", "graphChanged"]
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl GraphAssistant for OpenAiGraphAssistant {
    async fn propose(&self, request: &AssistantRequest) -> Result<AssistantReply> {
        let body = self.request_body(request)?;
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| Error::Assistant(format!("request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Assistant(format!(
                "OpenAI returned {status}: {detail}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| Error::Assistant(format!("malformed response: {error}")))?;
        let content = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| Error::Assistant("response carried no content".to_string()))?;

        debug!(model = %self.model, bytes = content.len(), "assistant replied");
        let reply: AssistantReply = serde_json::from_str(content).map_err(|error| {
            Error::Assistant(format!("reply did not match the expected schema: {error}"))
        })?;
        Ok(reply)
    }
}
