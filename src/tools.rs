//! Tool trait and registry
//!
//! Tools are the deterministic capabilities the advisor agent may call
//! while preparing an analysis. The registry is injected into the advisor
//! adapter explicitly; there is no global lookup.

use crate::analysis;
use crate::filters::{sanitize_filters, FilterSet};
use crate::store::{matches_filters, QueryExecutor, TransactionStore};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, arguments: &Value) -> Result<Value>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// One line per tool, for the advisor prompt.
    pub fn catalog(&self) -> String {
        let mut lines: Vec<String> = self
            .tools
            .values()
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn int_arg(arguments: &Value, key: &str, default: i64) -> i64 {
    arguments.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn float_arg(arguments: &Value, key: &str, default: f64) -> f64 {
    arguments.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn sanitized_filter_arg(arguments: &Value) -> std::result::Result<FilterSet, &'static str> {
    match arguments.get("filters") {
        None | Some(Value::Null) => Ok(FilterSet::new()),
        Some(Value::Object(raw)) => Ok(sanitize_filters(raw)),
        Some(_) => Err("filters must be a JSON object"),
    }
}

//
// ================= Transaction Search =================
//

pub struct TransactionSearchTool {
    executor: QueryExecutor,
}

impl TransactionSearchTool {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for TransactionSearchTool {
    fn name(&self) -> &'static str {
        "transaction_search"
    }

    fn description(&self) -> &'static str {
        "Fetch filtered bank transactions; arguments: filters (object), limit, offset"
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let limit = int_arg(arguments, "limit", 20);
        let offset = int_arg(arguments, "offset", 0);

        // A malformed filters argument yields an error payload rather than
        // aborting the advisor run.
        let filters = match sanitized_filter_arg(arguments) {
            Ok(filters) => filters,
            Err(message) => {
                return Ok(json!({
                    "error": message,
                    "total": 0,
                    "limit": limit,
                    "offset": offset,
                    "rows": [],
                }))
            }
        };

        let fields: Option<Vec<String>> = arguments
            .get("fields")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            });
        let field_refs: Option<Vec<&str>> = fields
            .as_ref()
            .map(|names| names.iter().map(String::as_str).collect());

        let result = self
            .executor
            .execute(&filters, limit, offset, field_refs.as_deref())
            .await?;
        Ok(result.to_value())
    }
}

//
// ================= Recurring Payments =================
//

pub struct RecurringPaymentsTool {
    store: Arc<dyn TransactionStore>,
}

impl RecurringPaymentsTool {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecurringPaymentsTool {
    fn name(&self) -> &'static str {
        "recurring_payments"
    }

    fn description(&self) -> &'static str {
        "Detect recurring outgoing payments (subscriptions, rent, utilities)"
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let defaults = analysis::RecurringConfig::default();
        let config = analysis::RecurringConfig {
            min_occurrences: int_arg(
                arguments,
                "min_occurrences",
                defaults.min_occurrences as i64,
            )
            .max(1) as usize,
            min_interval_days: int_arg(arguments, "min_interval_days", defaults.min_interval_days),
            max_interval_days: int_arg(arguments, "max_interval_days", defaults.max_interval_days),
            amount_tolerance: float_arg(arguments, "amount_tolerance", defaults.amount_tolerance),
            anomaly_tolerance: float_arg(
                arguments,
                "anomaly_tolerance",
                defaults.anomaly_tolerance,
            ),
        };

        let transactions = self.store.all().await?;
        let recurring = analysis::detect_recurring_payments(&transactions, &config);
        Ok(json!({
            "count": recurring.len(),
            "recurring_payments": recurring,
        }))
    }
}

//
// ================= Spending Summary =================
//

pub struct SpendingSummaryTool {
    store: Arc<dyn TransactionStore>,
}

impl SpendingSummaryTool {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SpendingSummaryTool {
    fn name(&self) -> &'static str {
        "spending_summary"
    }

    fn description(&self) -> &'static str {
        "Aggregate totals, averages and monthly spend; arguments: filters (object)"
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let filters = match sanitized_filter_arg(arguments) {
            Ok(filters) => filters,
            Err(message) => return Ok(json!({ "error": message })),
        };

        let transactions = self.store.all().await?;
        let matching: Vec<_> = transactions
            .into_iter()
            .filter(|tx| matches_filters(tx, &filters))
            .collect();
        let summary = analysis::summarize(&matching);
        Ok(serde_json::to_value(summary)?)
    }
}

/// Registry with the default capabilities wired to one store.
pub fn create_default_registry(store: Arc<dyn TransactionStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(TransactionSearchTool::new(QueryExecutor::new(
        store.clone(),
    ))));
    registry.register(Arc::new(RecurringPaymentsTool::new(store.clone())));
    registry.register(Arc::new(SpendingSummaryTool::new(store)));
    registry
}
