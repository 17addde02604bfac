//! Financial advisor adapter
//!
//! Runs the advisor agent with an injected tool capability: the agent may
//! answer directly, or request data by naming a registered tool. Tool
//! failures are fed back as error observations so one bad call does not
//! sink the whole analysis; only the call budget is a hard stop.

use super::{parse_agent_json, AgentClient, AgentId};
use crate::error::OrchestrationError;
use crate::models::{AdvisorOutput, TaskSpec};
use crate::tools::ToolRegistry;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on tool calls within one advisor run.
const MAX_TOOL_ROUNDS: usize = 4;

pub struct AdvisorAdapter {
    client: Arc<dyn AgentClient>,
    tools: Arc<ToolRegistry>,
}

impl AdvisorAdapter {
    pub fn new(client: Arc<dyn AgentClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { client, tools }
    }

    pub async fn run(&self, task: &TaskSpec) -> Result<AdvisorOutput> {
        let mut prompt = json!({
            "task_spec": task.to_value(),
            "available_tools": self.tools.catalog(),
        })
        .to_string();

        let mut rounds = 0;
        loop {
            let reply = self
                .client
                .invoke(AgentId::FinancialAdvisor, &prompt)
                .await?;
            let value = parse_agent_json(&reply)?;

            let Some(tool_name) = value.get("tool").and_then(Value::as_str) else {
                return Ok(AdvisorOutput::from_value(&value));
            };

            rounds += 1;
            if rounds > MAX_TOOL_ROUNDS {
                return Err(OrchestrationError::AgentError(format!(
                    "advisor exceeded the tool-call budget of {}",
                    MAX_TOOL_ROUNDS
                )));
            }

            let arguments = value
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            debug!(tool = tool_name, round = rounds, "advisor tool call");
            let observation = self.run_tool(tool_name, &arguments).await;

            prompt = json!({
                "task_spec": task.to_value(),
                "observation": {
                    "tool": tool_name,
                    "output": observation,
                },
            })
            .to_string();
        }
    }

    async fn run_tool(&self, name: &str, arguments: &Value) -> Value {
        match self.tools.get(name) {
            Some(tool) => match tool.execute(arguments).await {
                Ok(output) => output,
                Err(error) => {
                    warn!(tool = name, error = %error, "advisor tool failed");
                    json!({ "error": error.to_string() })
                }
            },
            None => {
                warn!(tool = name, "advisor requested unknown tool");
                json!({ "error": format!("unknown tool '{}'", name) })
            }
        }
    }
}
