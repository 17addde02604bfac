//! Orchestration engine
//!
//! The top-level state machine for one utterance:
//! classify → special-case check → route → execute → finalize.
//! Trivial intents short-circuit before any routing call, data searches
//! skip finalization when nothing was found, and a failed finalization is
//! downgraded rather than surfaced, since the underlying data operation
//! already succeeded. The engine is fail-terminal: anything it cannot
//! absorb propagates to the chat endpoint boundary.

use crate::agents::{self, AdvisorAdapter, AgentClient, ChatTurn};
use crate::filters::sanitize_filters;
use crate::models::{
    NormalizedResponse, Route, RouteDecision, TaskSpec, TaskType,
};
use crate::routing::normalize_route_decision;
use crate::store::{QueryExecutor, TransactionStore};
use crate::tools::create_default_registry;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

const GREETING_MESSAGE: &str =
    "Always good to hear from you! Just tell me what I can help you with.";
const AMBIGUOUS_CLARIFICATION_MESSAGE: &str =
    "Could you give me a bit more context so I can pick the right tool for you?";
const EMPTY_RESULT_MESSAGE: &str =
    "I could not find any matching transactions in the available data. \
     Feel free to try a different filter!";
const FINALIZE_FALLBACK_MESSAGE: &str =
    "Here is the data you asked for. Let me know if you want it presented differently.";

pub struct OrchestrationEngine {
    client: Arc<dyn AgentClient>,
    executor: QueryExecutor,
    advisor: AdvisorAdapter,
}

impl OrchestrationEngine {
    pub fn new(client: Arc<dyn AgentClient>, store: Arc<dyn TransactionStore>) -> Self {
        let registry = Arc::new(create_default_registry(store.clone()));
        Self {
            client: client.clone(),
            executor: QueryExecutor::new(store),
            advisor: AdvisorAdapter::new(client, registry),
        }
    }

    /// Run one orchestration: utterance in, normalized response out.
    pub async fn handle(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<NormalizedResponse> {
        let task = agents::classify(self.client.as_ref(), message, history).await?;
        info!(
            task_type = task.task_type.as_str(),
            summary = %task.intent_summary,
            "utterance classified"
        );

        if let Some(response) = intercept_special_task(&task) {
            debug!("special-case intercept, no routing call");
            return Ok(response);
        }

        if task.needs_clarification {
            if let Some(question) = task.clarification_question.clone() {
                return Ok(NormalizedResponse::clarification(
                    question,
                    Some(json!({ "task_spec": task.to_value() })),
                ));
            }
        }

        let plan = agents::request_routing(self.client.as_ref(), &task).await?;
        let decision = normalize_route_decision(plan);
        info!(route = decision.route.as_str(), reason = %decision.reason, "route decided");

        match decision.route {
            Route::Clarify => {
                let message = decision
                    .clarification_question
                    .clone()
                    .unwrap_or_else(|| decision.reason.clone());
                Ok(NormalizedResponse::clarification(
                    message,
                    Some(json!({ "task_spec": task.to_value() })),
                ))
            }
            Route::Reject => Ok(NormalizedResponse::rejected(
                decision.reason.clone(),
                Some(json!({ "task_spec": task.to_value() })),
            )),
            Route::DbSearch => self.run_db_search(&task, &decision).await,
            Route::FinancialAdvisor => {
                let advisor_output = self.advisor.run(&task).await?;
                self.finalize(
                    &task,
                    &decision,
                    json!({ "advisor_output": advisor_output.to_value() }),
                )
                .await
            }
        }
    }

    async fn run_db_search(
        &self,
        task: &TaskSpec,
        decision: &RouteDecision,
    ) -> Result<NormalizedResponse> {
        let filters = sanitize_filters(&decision.filters);
        let result = self
            .executor
            .execute(&filters, decision.limit, decision.offset, None)
            .await?;

        if result.total == 0 {
            // Nothing to render, so skip the finalize round trip.
            return Ok(NormalizedResponse::success(
                EMPTY_RESULT_MESSAGE,
                Some(json!({
                    "db_result": result.to_value(),
                    "task_spec": task.to_value(),
                })),
            ));
        }

        self.finalize(task, decision, json!({ "db_result": result.to_value() }))
            .await
    }

    /// Ask the orchestrator agent to render the final response. An `error`
    /// status from the agent is downgraded to a plain success carrying the
    /// raw payload.
    async fn finalize(
        &self,
        task: &TaskSpec,
        decision: &RouteDecision,
        result_payload: Value,
    ) -> Result<NormalizedResponse> {
        let response = agents::request_finalize(
            self.client.as_ref(),
            decision.route,
            task,
            &result_payload,
        )
        .await?;

        if response.status == crate::models::ResponseStatus::Error {
            info!("finalize returned error status, downgrading to success");
            return Ok(NormalizedResponse::success(
                FINALIZE_FALLBACK_MESSAGE,
                Some(result_payload),
            ));
        }
        Ok(response)
    }
}

/// Short-circuit trivial intents before any routing happens.
fn intercept_special_task(task: &TaskSpec) -> Option<NormalizedResponse> {
    match task.task_type {
        TaskType::Greeting | TaskType::Smalltalk => Some(NormalizedResponse::success(
            GREETING_MESSAGE,
            Some(json!({ "task_spec": task.to_value() })),
        )),
        TaskType::InformationRequest if asks_for_todays_date(task) => {
            let today = chrono::Utc::now().date_naive();
            Some(NormalizedResponse::success(
                format!("Today is {}.", today.format("%d.%m.%Y")),
                Some(json!({
                    "today": today.format("%Y-%m-%d").to_string(),
                    "task_spec": task.to_value(),
                })),
            ))
        }
        // A 'clarification' task type without the flag or a question is an
        // ambiguous classifier result; policy is to ask the user anyway.
        TaskType::Clarification
            if !task.needs_clarification && task.clarification_question.is_none() =>
        {
            Some(NormalizedResponse::clarification(
                AMBIGUOUS_CLARIFICATION_MESSAGE,
                Some(json!({ "task_spec": task.to_value() })),
            ))
        }
        _ => None,
    }
}

fn asks_for_todays_date(task: &TaskSpec) -> bool {
    let summary = task.intent_summary.to_lowercase();
    if summary.contains("date") || summary.contains("datum") {
        return true;
    }
    matches!(
        task.timeframe.as_deref().map(str::to_lowercase).as_deref(),
        Some("today") | Some("heute")
    )
}
