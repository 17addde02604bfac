//! Route normalization
//!
//! The orchestrator agent's routing reply is unreliable rather than
//! hostile: labels drift out of vocabulary and pagination sometimes hides
//! inside the filter map. `normalize_route_decision` is a total function
//! that turns any `RoutePlan` into a `RouteDecision` the engine can trust
//! unconditionally. Unrecognized routes degrade toward asking the user,
//! never toward refusing them.

use crate::models::{Route, RouteDecision, RoutePlan};
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_REASON: &str = "I lined up the next step for you.";
const FALLBACK_CLARIFICATION: &str =
    "Could you tell me a little more about what you are looking for?";

/// Labels that imply a data search even when the route name is wrong.
const DB_SEARCH_HINTS: &[&str] = &[
    "transaction_search",
    "search",
    "fetch",
    "db",
    "data",
    "lookup",
    "query",
];

const ADVISOR_HINTS: &[&str] = &["advisor", "analysis", "insight", "recommendation", "advice"];

const CLARIFY_HINTS: &[&str] = &[
    "clarification_required",
    "question",
    "follow_up",
    "greeting",
    "smalltalk",
];

/// Filter keys agents overload with pagination intent.
const PAGINATION_KEYS: &[&str] = &["limit", "anzahl", "top", "count"];

pub fn normalize_route_decision(plan: RoutePlan) -> RouteDecision {
    let label = plan.route.trim().to_lowercase();

    let route = match Route::from_label(&label).or_else(|| guess_route(&label, &plan.filters)) {
        Some(route) => route,
        None => {
            // Nothing recognizable: ask the user instead of rejecting them.
            let fallback = [plan.reason.as_str()]
                .into_iter()
                .chain(plan.clarification_question.as_deref())
                .find(|s| !s.is_empty())
                .unwrap_or(FALLBACK_CLARIFICATION)
                .to_string();
            debug!(label = %label, "unrecognized route, degrading to clarify");
            return RouteDecision {
                route: Route::Clarify,
                reason: fallback.clone(),
                filters: Map::new(),
                limit: clamp_limit(plan.limit),
                offset: clamp_offset(plan.offset),
                clarification_question: Some(fallback),
            };
        }
    };

    let mut filters = plan.filters;
    let mut limit = plan.limit;

    if route == Route::DbSearch {
        // Promote a stray pagination key into `limit` so it cannot reach
        // the query executor as a filter.
        for key in PAGINATION_KEYS {
            let candidate = filters
                .get(*key)
                .map(|v| (v.is_number() || v.is_string(), pagination_value(v)));
            if let Some((scalar, parsed)) = candidate {
                if scalar {
                    filters.remove(*key);
                    if let Some(promoted) = parsed {
                        limit = promoted;
                        break;
                    }
                }
            }
        }
    } else {
        // Non-search routes must never carry stale filter state downstream.
        filters = Map::new();
    }

    let reason = if plan.reason.is_empty() {
        DEFAULT_REASON.to_string()
    } else {
        plan.reason
    };

    let mut clarification_question = plan.clarification_question.filter(|q| !q.is_empty());
    if route == Route::Clarify && clarification_question.is_none() {
        clarification_question = Some(reason.clone());
    }

    RouteDecision {
        route,
        reason,
        filters,
        limit: clamp_limit(limit),
        offset: clamp_offset(plan.offset),
        clarification_question,
    }
}

fn guess_route(label: &str, filters: &Map<String, Value>) -> Option<Route> {
    if DB_SEARCH_HINTS.contains(&label) || !filters.is_empty() {
        Some(Route::DbSearch)
    } else if ADVISOR_HINTS.contains(&label) {
        Some(Route::FinancialAdvisor)
    } else if CLARIFY_HINTS.contains(&label) {
        Some(Route::Clarify)
    } else {
        None
    }
}

fn pagination_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 100)
}

fn clamp_offset(offset: i64) -> i64 {
    offset.max(0)
}
