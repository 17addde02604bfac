//! Filter sanitization
//!
//! Agents propose query filters as free-form key/value maps. This module is
//! the security boundary between that untrusted input and the query
//! executor: synonym keys are rewritten to canonical names, anything outside
//! the fixed allow-list is dropped, and values are type-coerced per key.
//! Invalid values are omitted silently; sanitization never fails.

use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

lazy_static! {
    /// Canonical filter keys the query executor accepts. Nothing outside
    /// this set may reach the store.
    pub static ref ALLOWED_DB_FILTERS: HashSet<&'static str> = [
        "start_date",
        "end_date",
        "payment_method",
        "min_amount",
        "max_amount",
        "country",
        "direction",
        "produkt",
        "account_name",
        "customer_name",
        "trx_type_name",
        "buchungs_art_name",
        "text_short_creditor",
        "text_creditor",
        "text_debitor",
        "point_of_sale_and_location",
        "acquirer_country_name",
        "cred_iban",
        "cred_addr_text",
        "cred_ref_nr",
        "cred_info",
    ]
    .into_iter()
    .collect();

    /// Vernacular keys agents like to invent, mapped to canonical names.
    pub static ref DB_FILTER_SYNONYMS: HashMap<&'static str, &'static str> = [
        ("transaktionstyp", "trx_type_name"),
        ("transactionstype", "trx_type_name"),
        ("transaction_type", "trx_type_name"),
        ("konto", "account_name"),
        ("konto_name", "account_name"),
    ]
    .into_iter()
    .collect();
}

/// A type-coerced filter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Date-range bounds pass through as opaque date strings.
    Date(String),
    Number(f64),
    Int(i64),
    Text(String),
}

impl FilterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Date(s) | FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FilterValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// Allow-listed, type-coerced query criteria. BTreeMap keeps iteration
/// deterministic for SQL building and logging.
pub type FilterSet = BTreeMap<String, FilterValue>;

/// Sanitize an arbitrary string-keyed map into a `FilterSet`.
pub fn sanitize_filters(raw_filters: &Map<String, Value>) -> FilterSet {
    let mut normalized: Map<String, Value> = Map::new();
    for (raw_key, value) in raw_filters {
        let key = DB_FILTER_SYNONYMS
            .get(raw_key.as_str())
            .copied()
            .unwrap_or(raw_key.as_str());
        normalized.insert(key.to_string(), value.clone());
    }

    let mut sanitized = FilterSet::new();
    for (key, value) in &normalized {
        if !ALLOWED_DB_FILTERS.contains(key.as_str()) {
            continue;
        }
        if value.is_null() {
            continue;
        }
        match key.as_str() {
            "start_date" | "end_date" => {
                if let Some(s) = value.as_str().filter(|s| !s.is_empty()) {
                    sanitized.insert(key.clone(), FilterValue::Date(s.to_string()));
                }
            }
            "min_amount" | "max_amount" => {
                if let Some(amount) = coerce_f64(value) {
                    sanitized.insert(key.clone(), FilterValue::Number(amount));
                }
            }
            "direction" => {
                if let Some(direction) = coerce_i64(value) {
                    sanitized.insert(key.clone(), FilterValue::Int(direction));
                }
            }
            _ => {
                if let Some(text) = coerce_text(value) {
                    sanitized.insert(key.clone(), FilterValue::Text(text));
                }
            }
        }
    }
    sanitized
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Arrays and objects are not meaningful filter criteria.
        _ => None,
    }
}
