//! Reasoning-agent access
//!
//! The engine talks to three named agents through the `AgentClient` trait:
//! a conversational classifier, an orchestrator (routing + finalize), and a
//! financial advisor. The trait is dependency-injected so tests can script
//! replies; replies are plain text with no JSON guarantee, and this module
//! is the compatibility boundary that parses them defensively.

use crate::error::OrchestrationError;
use crate::models::{NormalizedResponse, Route, RoutePlan, TaskSpec};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub mod advisor;
pub mod gemini;

pub use advisor::AdvisorAdapter;
pub use gemini::GeminiAgentClient;

/// Only the most recent turns of a conversation are replayed to the
/// classifier.
pub const HISTORY_WINDOW: usize = 10;

//
// ================= Agent Identities =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentId {
    Conversational,
    Orchestrator,
    FinancialAdvisor,
}

impl AgentId {
    pub fn name(&self) -> &'static str {
        match self {
            AgentId::Conversational => "conversational",
            AgentId::Orchestrator => "orchestrator",
            AgentId::FinancialAdvisor => "financial_advisor",
        }
    }

    /// System instructions sent alongside every prompt for this identity.
    pub fn instructions(&self) -> &'static str {
        match self {
            AgentId::Conversational => {
                "You are the bank's conversational assistant. Analyze the user's request and \
                 reply with ONLY a JSON object describing the task. Fields: task_type (one of \
                 ['fetch','insight','clarification','information_request','greeting','smalltalk','other']), \
                 intent_summary (short), filters (object with scalar values), timeframe (string \
                 or null), entities (list of strings), needs_clarification (bool), \
                 clarification_question (string or null). Use 'clarification' only when you \
                 genuinely need to ask back. No text outside the JSON."
            }
            AgentId::Orchestrator => {
                "You decide how a task description is fulfilled. Available routes: 'db_search', \
                 'financial_advisor', 'clarify', 'reject'. Input is JSON with phase ('routing' \
                 or 'finalize') and a task_spec. For routing, reply with JSON containing route, \
                 reason, filters, limit, offset and optionally clarification_question. For \
                 finalize, reply with JSON containing status ('success','clarification_required',\
                 'rejected','error'), message (friendly plain language) and data. No text \
                 outside the JSON."
            }
            AgentId::FinancialAdvisor => {
                "You prepare financial analyses over the customer's bank transactions. To \
                 inspect data, reply with JSON {\"tool\": \"<name>\", \"arguments\": {...}} \
                 naming one of the available tools; the observation comes back in the next \
                 prompt. When you are done, reply with JSON containing recommendation, \
                 key_insights, evidence and caveats. No text outside the JSON."
            }
        }
    }
}

/// Submit a prompt to a named reasoning agent, receive its reply text.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(&self, agent: AgentId, prompt: &str) -> Result<String>;
}

//
// ================= Reply Parsing =================
//

/// Parse an agent reply as JSON, tolerating a markdown code fence around
/// the payload. Anything else is a `MalformedAgentReply`: the agent
/// deviated from its contract entirely, so there is nothing to repair.
pub fn parse_agent_json(reply: &str) -> Result<Value> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned)
        .map_err(|_| OrchestrationError::MalformedAgentReply(snippet(reply)))
}

fn snippet(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.chars().count() > 200 {
        let cut: String = trimmed.chars().take(200).collect();
        format!("{}…", cut)
    } else {
        trimmed.to_string()
    }
}

//
// ================= Conversation History =================
//

/// One prior turn of the conversation, as supplied by the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Prefix the utterance with the last few turns, speaker-labeled. Turns
/// without a recognized role are dropped silently.
pub fn build_classifier_prompt(message: &str, history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let snippets: Vec<String> = history[start..]
        .iter()
        .filter_map(|turn| match turn.role.as_str() {
            "user" => Some(format!("User: {}", turn.content)),
            "assistant" => Some(format!("Assistant: {}", turn.content)),
            _ => None,
        })
        .collect();

    if snippets.is_empty() {
        return message.to_string();
    }

    format!(
        "Conversation so far:\n{}\nNew user request: {}",
        snippets.join("\n"),
        message
    )
}

//
// ================= Adapters =================
//

/// Classify one utterance into a `TaskSpec`.
pub async fn classify(
    client: &dyn AgentClient,
    message: &str,
    history: &[ChatTurn],
) -> Result<TaskSpec> {
    let prompt = build_classifier_prompt(message, history);
    let reply = client.invoke(AgentId::Conversational, &prompt).await?;
    let value = parse_agent_json(&reply)?;
    Ok(TaskSpec::from_value(&value))
}

/// Ask the orchestrator agent for a fulfillment plan. The result is raw and
/// untrusted; it must pass through the route normalizer before use.
pub async fn request_routing(client: &dyn AgentClient, task: &TaskSpec) -> Result<RoutePlan> {
    let payload = json!({
        "phase": "routing",
        "task_spec": task.to_value(),
    });
    let reply = client
        .invoke(AgentId::Orchestrator, &payload.to_string())
        .await?;
    let value = parse_agent_json(&reply)?;
    Ok(RoutePlan::from_value(&value))
}

/// Ask the orchestrator agent to render the final user-facing response for
/// a completed route.
pub async fn request_finalize(
    client: &dyn AgentClient,
    route: Route,
    task: &TaskSpec,
    result_data: &Value,
) -> Result<NormalizedResponse> {
    let payload = json!({
        "phase": "finalize",
        "route": route.as_str(),
        "task_spec": task.to_value(),
        "result_data": result_data,
    });
    let reply = client
        .invoke(AgentId::Orchestrator, &payload.to_string())
        .await?;
    let value = parse_agent_json(&reply)?;
    Ok(NormalizedResponse::from_value(&value))
}

//
// ================= Mock Client =================
//

/// Scripted agent client for development and tests. Replies are consumed
/// per agent in FIFO order; an unexpected call fails loudly instead of
/// inventing output.
pub struct MockAgentClient {
    replies: Mutex<HashMap<AgentId, VecDeque<String>>>,
    calls: Mutex<Vec<(AgentId, String)>>,
}

impl MockAgentClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, agent: AgentId, reply: impl Into<String>) {
        self.replies
            .lock()
            .expect("mock replies lock")
            .entry(agent)
            .or_default()
            .push_back(reply.into());
    }

    /// How many times an agent was invoked.
    pub fn calls_for(&self, agent: AgentId) -> usize {
        self.calls
            .lock()
            .expect("mock calls lock")
            .iter()
            .filter(|(id, _)| *id == agent)
            .count()
    }

    /// The prompt of the nth call to an agent, for assertions.
    pub fn prompt_for(&self, agent: AgentId, index: usize) -> Option<String> {
        self.calls
            .lock()
            .expect("mock calls lock")
            .iter()
            .filter(|(id, _)| *id == agent)
            .nth(index)
            .map(|(_, prompt)| prompt.clone())
    }
}

impl Default for MockAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn invoke(&self, agent: AgentId, prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .expect("mock calls lock")
            .push((agent, prompt.to_string()));
        self.replies
            .lock()
            .expect("mock replies lock")
            .get_mut(&agent)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                OrchestrationError::AgentError(format!(
                    "no scripted reply for agent '{}'",
                    agent.name()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_parse_agent_json_strips_code_fences() {
        let value = parse_agent_json("```json\n{\"route\": \"db_search\"}\n```").expect("parses");
        assert_eq!(value["route"], "db_search");

        let value = parse_agent_json("{\"route\": \"clarify\"}").expect("parses");
        assert_eq!(value["route"], "clarify");
    }

    #[test]
    fn test_parse_agent_json_rejects_prose() {
        let err = parse_agent_json("Gladly! Here is what I found: nothing.").unwrap_err();
        assert!(matches!(err, OrchestrationError::MalformedAgentReply(_)));
    }

    #[test]
    fn test_history_window_keeps_last_ten_turns() {
        let history: Vec<ChatTurn> = (0..15)
            .map(|i| turn(if i % 2 == 0 { "user" } else { "assistant" }, &format!("turn {}", i)))
            .collect();
        let prompt = build_classifier_prompt("latest question", &history);
        assert!(!prompt.contains("turn 4"));
        assert!(prompt.contains("turn 5"));
        assert!(prompt.contains("turn 14"));
        assert!(prompt.ends_with("latest question"));
    }

    #[test]
    fn test_unrecognized_roles_are_dropped() {
        let history = vec![
            turn("system", "be nice"),
            turn("tool", "{}"),
            turn("user", "show my rent"),
        ];
        let prompt = build_classifier_prompt("and groceries?", &history);
        assert!(!prompt.contains("be nice"));
        assert!(prompt.contains("User: show my rent"));
    }

    #[test]
    fn test_history_of_only_unrecognized_roles_yields_bare_message() {
        let history = vec![turn("system", "be nice")];
        let prompt = build_classifier_prompt("hello", &history);
        assert_eq!(prompt, "hello");
    }

    #[tokio::test]
    async fn test_mock_client_fails_on_unscripted_call() {
        let mock = MockAgentClient::new();
        let err = mock.invoke(AgentId::Orchestrator, "{}").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::AgentError(_)));
    }

    #[tokio::test]
    async fn test_classify_parses_task_spec() {
        let mock = MockAgentClient::new();
        mock.enqueue(
            AgentId::Conversational,
            r#"{"task_type": "greeting", "intent_summary": "says hello"}"#,
        );
        let spec = classify(&mock, "hi there", &[]).await.expect("classified");
        assert_eq!(spec.task_type, crate::models::TaskType::Greeting);
        assert_eq!(mock.calls_for(AgentId::Conversational), 1);
    }
}
