//! Postgres-backed transaction store
//!
//! Pushes the same predicate semantics as the in-memory store down into
//! SQL. The schema is created lazily on first use so a fresh database works
//! out of the box.

use super::TransactionStore;
use crate::error::OrchestrationError;
use crate::filters::FilterSet;
use crate::models::Transaction;
use crate::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::env;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;

const SELECT_COLUMNS: &str = "id, val_date, trx_date, amount::float8 AS amount, direction, \
    customer_name, account_name, currency, produkt, trx_type_name, trx_type_short, \
    buchungs_art_name, acquirer_country_name, point_of_sale_and_location, \
    text_short_creditor, text_creditor, text_debitor, cred_iban, cred_addr_text, \
    cred_ref_nr, cred_info";

pub struct PgTransactionStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build from `DATABASE_URL`/`POSTGRES_URL`; `None` when not configured
    /// or the pool cannot be constructed.
    pub fn from_env() -> Option<Self> {
        let url = env::var("DATABASE_URL")
            .or_else(|_| env::var("POSTGRES_URL"))
            .ok()?;
        match PgPoolOptions::new().max_connections(5).connect_lazy(&url) {
            Ok(pool) => Some(Self::new(pool)),
            Err(error) => {
                warn!("Failed to initialize postgres transaction store: {}", error);
                None
            }
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS bank_transactions (
                      id BIGSERIAL PRIMARY KEY,
                      val_date DATE NOT NULL,
                      trx_date DATE,
                      amount NUMERIC(12, 2),
                      direction SMALLINT NOT NULL,
                      customer_name TEXT NOT NULL DEFAULT '',
                      account_name TEXT NOT NULL DEFAULT '',
                      currency TEXT NOT NULL DEFAULT 'CHF',
                      produkt TEXT,
                      trx_type_name TEXT NOT NULL DEFAULT '',
                      trx_type_short TEXT,
                      buchungs_art_name TEXT,
                      acquirer_country_name TEXT,
                      point_of_sale_and_location TEXT,
                      text_short_creditor TEXT,
                      text_creditor TEXT,
                      text_debitor TEXT,
                      cred_iban TEXT,
                      cred_addr_text TEXT,
                      cred_ref_nr TEXT,
                      cred_info TEXT
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_bank_transactions_val_date
                    ON bank_transactions (val_date DESC);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                OrchestrationError::DatabaseError(format!(
                    "Failed to initialize transaction schema: {}",
                    e
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn count(&self, filters: &FilterSet) -> Result<usize> {
        self.ensure_schema().await?;

        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bank_transactions WHERE 1=1");
        push_filter_predicates(&mut builder, filters);

        let row = builder.build().fetch_one(&self.pool).await.map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to count transactions: {}", e))
        })?;
        let total: i64 = row.try_get(0).unwrap_or(0);
        Ok(total.max(0) as usize)
    }

    async fn fetch(
        &self,
        filters: &FilterSet,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM bank_transactions WHERE 1=1",
            SELECT_COLUMNS
        ));
        push_filter_predicates(&mut builder, filters);
        builder.push(" ORDER BY val_date DESC, id DESC LIMIT ");
        builder.push_bind(limit.max(0));
        builder.push(" OFFSET ");
        builder.push_bind(offset.max(0));

        let rows = builder.build().fetch_all(&self.pool).await.map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to fetch transactions: {}", e))
        })?;
        Ok(rows.iter().map(transaction_from_row).collect())
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM bank_transactions ORDER BY val_date ASC, id ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to load transactions: {}", e))
        })?;
        Ok(rows.iter().map(transaction_from_row).collect())
    }
}

/// Append one `AND <column> <op> <bound>` per filter. Keys come out of the
/// sanitizer's allow-list, so mapping them onto column names is safe.
fn push_filter_predicates(builder: &mut QueryBuilder<'_, Postgres>, filters: &FilterSet) {
    for (key, value) in filters {
        match key.as_str() {
            "start_date" => {
                if let Some(bound) = value.as_text().and_then(super::parse_date) {
                    builder.push(" AND val_date >= ").push_bind(bound);
                }
            }
            "end_date" => {
                if let Some(bound) = value.as_text().and_then(super::parse_date) {
                    builder.push(" AND val_date <= ").push_bind(bound);
                }
            }
            "min_amount" => {
                if let Some(bound) = value.as_number() {
                    builder.push(" AND amount >= ").push_bind(bound);
                }
            }
            "max_amount" => {
                if let Some(bound) = value.as_number() {
                    builder.push(" AND amount <= ").push_bind(bound);
                }
            }
            "direction" => {
                if let Some(direction) = value.as_int() {
                    builder.push(" AND direction = ").push_bind(direction);
                }
            }
            other => {
                let column = match other {
                    "payment_method" | "trx_type_name" => "trx_type_name",
                    "country" | "acquirer_country_name" => "acquirer_country_name",
                    "produkt" | "account_name" | "customer_name" | "buchungs_art_name"
                    | "text_short_creditor" | "text_creditor" | "text_debitor"
                    | "point_of_sale_and_location" | "cred_iban" | "cred_addr_text"
                    | "cred_ref_nr" | "cred_info" => other,
                    // Fail closed on anything the sanitizer should have dropped.
                    _ => {
                        builder.push(" AND FALSE");
                        continue;
                    }
                };
                if let Some(text) = value.as_text() {
                    builder.push(format!(" AND {} ILIKE ", column));
                    builder.push_bind(format!("%{}%", escape_like(text)));
                }
            }
        }
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn transaction_from_row(row: &PgRow) -> Transaction {
    Transaction {
        id: row.try_get("id").unwrap_or(0),
        val_date: row
            .try_get("val_date")
            .unwrap_or_else(|_| chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch")),
        trx_date: row.try_get("trx_date").unwrap_or(None),
        amount: row.try_get("amount").unwrap_or(None),
        direction: row.try_get::<i16, _>("direction").unwrap_or(0) as i64,
        customer_name: row.try_get("customer_name").unwrap_or_default(),
        account_name: row.try_get("account_name").unwrap_or_default(),
        currency: row.try_get("currency").unwrap_or_default(),
        produkt: row.try_get("produkt").unwrap_or(None),
        trx_type_name: row.try_get("trx_type_name").unwrap_or_default(),
        trx_type_short: row.try_get("trx_type_short").unwrap_or(None),
        buchungs_art_name: row.try_get("buchungs_art_name").unwrap_or(None),
        acquirer_country_name: row.try_get("acquirer_country_name").unwrap_or(None),
        point_of_sale_and_location: row.try_get("point_of_sale_and_location").unwrap_or(None),
        text_short_creditor: row.try_get("text_short_creditor").unwrap_or(None),
        text_creditor: row.try_get("text_creditor").unwrap_or(None),
        text_debitor: row.try_get("text_debitor").unwrap_or(None),
        cred_iban: row.try_get("cred_iban").unwrap_or(None),
        cred_addr_text: row.try_get("cred_addr_text").unwrap_or(None),
        cred_ref_nr: row.try_get("cred_ref_nr").unwrap_or(None),
        cred_info: row.try_get("cred_info").unwrap_or(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_patterns_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c\\d"), "c\\\\d");
    }

    #[test]
    fn test_predicates_render_for_each_filter_kind() {
        use crate::filters::sanitize_filters;
        use serde_json::json;

        let filters = sanitize_filters(
            json!({
                "start_date": "2025-01-01",
                "min_amount": 10,
                "direction": 2,
                "text_creditor": "Netflix",
            })
            .as_object()
            .expect("object"),
        );

        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 WHERE 1=1");
        push_filter_predicates(&mut builder, &filters);
        let sql = builder.sql();
        assert!(sql.contains("val_date >="));
        assert!(sql.contains("amount >="));
        assert!(sql.contains("direction ="));
        assert!(sql.contains("text_creditor ILIKE"));
    }
}
