//! Transaction store access and the query executor
//!
//! The store itself is an external collaborator reached through the
//! `TransactionStore` trait; this module owns the filter predicate
//! semantics, pagination clamping, and the conversion of records into
//! transport-safe row maps.

use crate::filters::{FilterSet, FilterValue};
use crate::models::{DbResult, Transaction};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryTransactionStore;
pub use postgres::PgTransactionStore;

/// Columns returned to the caller when no explicit projection is requested.
pub const DEFAULT_RESULT_FIELDS: &[&str] = &[
    "id",
    "val_date",
    "amount",
    "direction",
    "customer_name",
    "account_name",
    "trx_type_name",
    "acquirer_country_name",
    "text_creditor",
    "trx_type_short",
    "buchungs_art_name",
    "text_debitor",
];

/// Filter-and-fetch capability over the bank transaction collection.
///
/// Implementations must order fetched windows by value date descending:
/// pagination offsets are only meaningful under a fixed order.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Filtered match count, independent of pagination.
    async fn count(&self, filters: &FilterSet) -> Result<usize>;

    /// One window of filtered records, value date descending.
    async fn fetch(&self, filters: &FilterSet, limit: i64, offset: i64)
        -> Result<Vec<Transaction>>;

    /// Every record, value date ascending. Used by whole-table analysis
    /// such as recurring payment detection.
    async fn all(&self) -> Result<Vec<Transaction>>;
}

/// Select the store backend from the environment: Postgres when a database
/// URL is configured, otherwise an in-memory store seeded with demo data.
pub fn store_from_env() -> Arc<dyn TransactionStore> {
    if let Some(store) = PgTransactionStore::from_env() {
        tracing::info!("Transaction store backend: postgres");
        return Arc::new(store);
    }
    tracing::info!("Transaction store backend: in-memory (seeded with demo data)");
    Arc::new(InMemoryTransactionStore::with_transactions(
        memory::sample_transactions(),
    ))
}

//
// ================= Query Executor =================
//

/// Applies a sanitized filter set against the store, paginates, and
/// normalizes row values for transport.
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn TransactionStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        filters: &FilterSet,
        limit: i64,
        offset: i64,
        fields: Option<&[&str]>,
    ) -> Result<DbResult> {
        let capped_limit = limit.clamp(1, 100);
        let safe_offset = offset.max(0);
        let selected_fields = fields.unwrap_or(DEFAULT_RESULT_FIELDS);

        let total = self.store.count(filters).await?;
        let records = self.store.fetch(filters, capped_limit, safe_offset).await?;
        let rows = records
            .iter()
            .map(|tx| to_transport_row(tx, selected_fields))
            .collect();

        debug!(
            total,
            limit = capped_limit,
            offset = safe_offset,
            "transaction query executed"
        );

        Ok(DbResult {
            total,
            limit: capped_limit,
            offset: safe_offset,
            rows,
        })
    }
}

//
// ================= Predicates =================
//

/// Conjunction of per-field predicates over one record. Keys are trusted to
/// be allow-listed (the sanitizer is the boundary); an unexpected key fails
/// closed and matches nothing.
pub fn matches_filters(tx: &Transaction, filters: &FilterSet) -> bool {
    for (key, value) in filters {
        let hit = match key.as_str() {
            // Unparseable date bounds are ignored rather than matching
            // nothing: the sanitizer passes dates through opaquely.
            "start_date" => match value.as_text().and_then(parse_date) {
                Some(bound) => tx.val_date >= bound,
                None => true,
            },
            "end_date" => match value.as_text().and_then(parse_date) {
                Some(bound) => tx.val_date <= bound,
                None => true,
            },
            "min_amount" => match (tx.amount, value.as_number()) {
                (Some(amount), Some(bound)) => amount >= bound,
                _ => false,
            },
            "max_amount" => match (tx.amount, value.as_number()) {
                (Some(amount), Some(bound)) => amount <= bound,
                _ => false,
            },
            "direction" => value.as_int() == Some(tx.direction),
            "payment_method" | "trx_type_name" => text_matches(value, Some(&tx.trx_type_name)),
            "country" | "acquirer_country_name" => {
                text_matches(value, tx.acquirer_country_name.as_deref())
            }
            "produkt" => text_matches(value, tx.produkt.as_deref()),
            "account_name" => text_matches(value, Some(&tx.account_name)),
            "customer_name" => text_matches(value, Some(&tx.customer_name)),
            "buchungs_art_name" => text_matches(value, tx.buchungs_art_name.as_deref()),
            "text_short_creditor" => text_matches(value, tx.text_short_creditor.as_deref()),
            "text_creditor" => text_matches(value, tx.text_creditor.as_deref()),
            "text_debitor" => text_matches(value, tx.text_debitor.as_deref()),
            "point_of_sale_and_location" => {
                text_matches(value, tx.point_of_sale_and_location.as_deref())
            }
            "cred_iban" => text_matches(value, tx.cred_iban.as_deref()),
            "cred_addr_text" => text_matches(value, tx.cred_addr_text.as_deref()),
            "cred_ref_nr" => text_matches(value, tx.cred_ref_nr.as_deref()),
            "cred_info" => text_matches(value, tx.cred_info.as_deref()),
            _ => false,
        };
        if !hit {
            return false;
        }
    }
    true
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Case-insensitive substring match for free-text fields.
fn text_matches(value: &FilterValue, haystack: Option<&str>) -> bool {
    match (value.as_text(), haystack) {
        (Some(needle), Some(hay)) => hay.to_lowercase().contains(&needle.to_lowercase()),
        _ => false,
    }
}

//
// ================= Transport Conversion =================
//

/// Project one record into a transport-safe row map: dates become ISO-8601
/// strings, monetary amounts plain floats. Unknown field names are skipped.
pub fn to_transport_row(tx: &Transaction, fields: &[&str]) -> Map<String, Value> {
    let mut row = Map::new();
    for field in fields {
        if let Some(value) = field_value(tx, field) {
            row.insert((*field).to_string(), value);
        }
    }
    row
}

fn field_value(tx: &Transaction, field: &str) -> Option<Value> {
    let value = match field {
        "id" => json!(tx.id),
        "val_date" => json!(tx.val_date.format("%Y-%m-%d").to_string()),
        "trx_date" => tx
            .trx_date
            .map(|d| json!(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        "amount" => json!(tx.amount),
        "direction" => json!(tx.direction),
        "customer_name" => json!(tx.customer_name),
        "account_name" => json!(tx.account_name),
        "currency" => json!(tx.currency),
        "produkt" => json!(tx.produkt),
        "trx_type_name" => json!(tx.trx_type_name),
        "trx_type_short" => json!(tx.trx_type_short),
        "buchungs_art_name" => json!(tx.buchungs_art_name),
        "acquirer_country_name" => json!(tx.acquirer_country_name),
        "point_of_sale_and_location" => json!(tx.point_of_sale_and_location),
        "text_short_creditor" => json!(tx.text_short_creditor),
        "text_creditor" => json!(tx.text_creditor),
        "text_debitor" => json!(tx.text_debitor),
        "cred_iban" => json!(tx.cred_iban),
        "cred_addr_text" => json!(tx.cred_addr_text),
        "cred_ref_nr" => json!(tx.cred_ref_nr),
        "cred_info" => json!(tx.cred_info),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{sanitize_filters, FilterValue};
    use serde_json::json;

    fn seeded_executor() -> QueryExecutor {
        let store = InMemoryTransactionStore::with_transactions(memory::sample_transactions());
        QueryExecutor::new(Arc::new(store))
    }

    fn filter_set(value: Value) -> FilterSet {
        sanitize_filters(value.as_object().expect("object literal"))
    }

    #[tokio::test]
    async fn test_rows_never_exceed_limit() {
        let executor = seeded_executor();
        for limit in [1, 2, 5, 200] {
            let result = executor
                .execute(&FilterSet::new(), limit, 0, None)
                .await
                .expect("query runs");
            assert!(result.rows.len() as i64 <= result.limit);
            assert!(result.limit <= 100);
        }
    }

    #[tokio::test]
    async fn test_total_is_invariant_to_pagination() {
        let executor = seeded_executor();
        let filters = filter_set(json!({"direction": 2}));

        let first = executor.execute(&filters, 2, 0, None).await.expect("query");
        let second = executor.execute(&filters, 50, 3, None).await.expect("query");
        assert_eq!(first.total, second.total);
        assert!(first.total >= first.rows.len());
    }

    #[tokio::test]
    async fn test_rows_ordered_by_value_date_descending() {
        let executor = seeded_executor();
        let result = executor
            .execute(&FilterSet::new(), 100, 0, None)
            .await
            .expect("query");
        let dates: Vec<String> = result
            .rows
            .iter()
            .filter_map(|row| row.get("val_date").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let mut sorted = dates.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, sorted);
    }

    #[tokio::test]
    async fn test_substring_match_is_case_insensitive() {
        let executor = seeded_executor();
        let filters = filter_set(json!({"text_creditor": "netflix"}));
        let result = executor.execute(&filters, 100, 0, None).await.expect("query");
        assert!(result.total > 0);
        for row in &result.rows {
            let creditor = row
                .get("text_creditor")
                .and_then(Value::as_str)
                .unwrap_or_default();
            assert!(creditor.to_lowercase().contains("netflix"));
        }
    }

    #[tokio::test]
    async fn test_amount_range_is_inclusive() {
        let executor = seeded_executor();
        let filters = filter_set(json!({"min_amount": 17.90, "max_amount": 17.90}));
        let result = executor.execute(&filters, 100, 0, None).await.expect("query");
        assert!(result.total > 0);
        for row in &result.rows {
            assert_eq!(row.get("amount").and_then(Value::as_f64), Some(17.90));
        }
    }

    #[tokio::test]
    async fn test_unparseable_date_bound_is_ignored() {
        let executor = seeded_executor();
        let unbounded = executor
            .execute(&FilterSet::new(), 100, 0, None)
            .await
            .expect("query");
        let filters = filter_set(json!({"start_date": "whenever"}));
        let result = executor.execute(&filters, 100, 0, None).await.expect("query");
        assert_eq!(result.total, unbounded.total);
    }

    #[tokio::test]
    async fn test_transport_row_shapes() {
        let executor = seeded_executor();
        let result = executor.execute(&FilterSet::new(), 1, 0, None).await.expect("query");
        let row = result.rows.first().expect("seeded data");
        let val_date = row.get("val_date").and_then(Value::as_str).expect("iso date");
        assert!(parse_date(val_date).is_some());
        assert!(row.get("amount").map(|v| v.is_number() || v.is_null()).unwrap_or(false));
        // Only projected fields appear.
        assert!(!row.contains_key("cred_iban"));
    }

    #[test]
    fn test_unknown_filter_key_fails_closed() {
        let tx = memory::sample_transactions().remove(0);
        let mut filters = FilterSet::new();
        filters.insert("mystery".into(), FilterValue::Text("x".into()));
        assert!(!matches_filters(&tx, &filters));
    }
}
