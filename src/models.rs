//! Core data models for the orchestration pipeline
//!
//! Every struct that is parsed out of a reasoning-agent reply gets a
//! `from_value` constructor with explicit per-field defaults. Agent output
//! is untrusted structured text; missing or mistyped optional fields fall
//! back to safe defaults instead of failing the whole request.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

//
// ================= Task Classification =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Fetch,
    Insight,
    Clarification,
    InformationRequest,
    Greeting,
    Smalltalk,
    Other,
}

impl TaskType {
    /// Coerce a classifier-provided label into the enum. Unknown labels map
    /// to `Other`, never propagate.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "fetch" => TaskType::Fetch,
            "insight" => TaskType::Insight,
            "clarification" => TaskType::Clarification,
            "information_request" | "info" => TaskType::InformationRequest,
            "greeting" => TaskType::Greeting,
            "smalltalk" => TaskType::Smalltalk,
            _ => TaskType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Fetch => "fetch",
            TaskType::Insight => "insight",
            TaskType::Clarification => "clarification",
            TaskType::InformationRequest => "information_request",
            TaskType::Greeting => "greeting",
            TaskType::Smalltalk => "smalltalk",
            TaskType::Other => "other",
        }
    }
}

/// The classifier agent's structured interpretation of one utterance.
/// Created once per request, immutable afterwards, echoed into downstream
/// payloads for traceability.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSpec {
    pub task_type: TaskType,
    pub intent_summary: String,
    pub filters: Map<String, Value>,
    pub timeframe: Option<String>,
    pub entities: Vec<String>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
    pub raw: Option<String>,
}

impl TaskSpec {
    pub fn from_value(data: &Value) -> Self {
        Self {
            task_type: TaskType::from_label(
                data.get("task_type").and_then(Value::as_str).unwrap_or("other"),
            ),
            intent_summary: string_field(data, "intent_summary"),
            filters: object_field(data, "filters"),
            timeframe: data.get("timeframe").and_then(render_scalar),
            entities: data
                .get("entities")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            needs_clarification: data
                .get("needs_clarification")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            clarification_question: optional_string_field(data, "clarification_question"),
            raw: optional_string_field(data, "raw"),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

//
// ================= Routing =================
//

/// The four fulfillment strategies the engine understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    DbSearch,
    FinancialAdvisor,
    Clarify,
    Reject,
}

impl Route {
    /// Strict parse: only the four canonical labels. Anything else is the
    /// normalizer's problem.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "db_search" => Some(Route::DbSearch),
            "financial_advisor" => Some(Route::FinancialAdvisor),
            "clarify" => Some(Route::Clarify),
            "reject" => Some(Route::Reject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::DbSearch => "db_search",
            Route::FinancialAdvisor => "financial_advisor",
            Route::Clarify => "clarify",
            Route::Reject => "reject",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The orchestrator agent's raw fulfillment plan, exactly as parsed from its
/// reply. The route label may be out of vocabulary and the pagination values
/// unbounded; only the normalizer turns this into a `RouteDecision`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub route: String,
    pub reason: String,
    pub filters: Map<String, Value>,
    pub limit: i64,
    pub offset: i64,
    pub clarification_question: Option<String>,
}

impl RoutePlan {
    pub fn from_value(data: &Value) -> Self {
        Self {
            route: data
                .get("route")
                .and_then(Value::as_str)
                .unwrap_or("reject")
                .to_string(),
            reason: string_field(data, "reason"),
            filters: object_field(data, "filters"),
            limit: integer_field(data, "limit", 20),
            offset: integer_field(data, "offset", 0),
            clarification_question: optional_string_field(data, "clarification_question"),
        }
    }
}

/// A normalized fulfillment plan. Invariants are enforced by construction:
/// the route is canonical, `1 <= limit <= 100`, `offset >= 0`, and filters
/// are empty unless the route is `DbSearch`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub route: Route,
    pub reason: String,
    pub filters: Map<String, Value>,
    pub limit: i64,
    pub offset: i64,
    pub clarification_question: Option<String>,
}

//
// ================= Query Results =================
//

/// One page of transaction rows in transport form. `total` counts all
/// filtered matches independent of pagination.
#[derive(Debug, Clone, Serialize)]
pub struct DbResult {
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
    pub rows: Vec<Map<String, Value>>,
}

impl DbResult {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

//
// ================= Advisor Output =================
//

#[derive(Debug, Clone, Serialize)]
pub struct AdvisorOutput {
    pub recommendation: String,
    pub key_insights: Vec<String>,
    pub evidence: Vec<String>,
    pub caveats: Vec<String>,
}

impl AdvisorOutput {
    pub fn from_value(data: &Value) -> Self {
        Self {
            recommendation: string_field(data, "recommendation"),
            key_insights: string_list_field(data, "key_insights"),
            evidence: string_list_field(data, "evidence"),
            caveats: string_list_field(data, "caveats"),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

//
// ================= Final Response =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    ClarificationRequired,
    Rejected,
    Error,
}

impl ResponseStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "success" => ResponseStatus::Success,
            "clarification_required" => ResponseStatus::ClarificationRequired,
            "rejected" => ResponseStatus::Rejected,
            _ => ResponseStatus::Error,
        }
    }
}

/// The pipeline's terminal artifact and the only value handed back to the
/// chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub data: Option<Value>,
}

impl NormalizedResponse {
    pub fn from_value(data: &Value) -> Self {
        Self {
            status: ResponseStatus::from_label(
                data.get("status").and_then(Value::as_str).unwrap_or("error"),
            ),
            message: string_field(data, "message"),
            data: data.get("data").cloned().filter(|v| !v.is_null()),
        }
    }

    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn clarification(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: ResponseStatus::ClarificationRequired,
            message: message.into(),
            data,
        }
    }

    pub fn rejected(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: ResponseStatus::Rejected,
            message: message.into(),
            data,
        }
    }
}

//
// ================= Transactions =================
//

pub const DIRECTION_INFLOW: i64 = 1;
pub const DIRECTION_OUTFLOW: i64 = 2;

/// A bank transaction record as delivered by the transaction store.
///
/// Field names follow the upstream core-banking export (hence the mixed
/// German/English vocabulary); the filter allow-list keys must stay aligned
/// with these names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub val_date: NaiveDate,
    pub trx_date: Option<NaiveDate>,
    /// Fixed-point in the store; converted to float at the store boundary.
    pub amount: Option<f64>,
    /// 1 = inflow, 2 = outflow
    pub direction: i64,
    pub customer_name: String,
    pub account_name: String,
    pub currency: String,
    pub produkt: Option<String>,
    pub trx_type_name: String,
    pub trx_type_short: Option<String>,
    pub buchungs_art_name: Option<String>,
    pub acquirer_country_name: Option<String>,
    pub point_of_sale_and_location: Option<String>,
    pub text_short_creditor: Option<String>,
    pub text_creditor: Option<String>,
    pub text_debitor: Option<String>,
    pub cred_iban: Option<String>,
    pub cred_addr_text: Option<String>,
    pub cred_ref_nr: Option<String>,
    pub cred_info: Option<String>,
}

impl Transaction {
    pub fn is_outgoing(&self) -> bool {
        self.direction == DIRECTION_OUTFLOW
    }
}

//
// ================= Recurring Payments =================
//

/// An amount outlier inside an otherwise-periodic payment group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountAnomaly {
    pub date: NaiveDate,
    pub amount: Option<f64>,
}

/// A detected recurring payment. Ephemeral: computed per detection call,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RecurringPayment {
    pub creditor: String,
    pub base_amount: f64,
    pub occurrences: usize,
    pub last_payment: NaiveDate,
    pub anomalies: Vec<AmountAnomaly>,
}

//
// ================= Field Helpers =================
//

fn string_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn optional_string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn object_field(data: &Value, key: &str) -> Map<String, Value> {
    data.get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn string_list_field(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn integer_field(data: &Value, key: &str, default: i64) -> i64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Classifiers occasionally emit the timeframe as an object instead of a
/// string; render anything non-null to its JSON text rather than dropping it.
fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
