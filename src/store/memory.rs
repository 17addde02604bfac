//! In-memory transaction store
//!
//! Backs development, the demo binary, and tests. Filtering and sorting of
//! a snapshot run on a blocking worker so a large scan never occupies the
//! request task.

use super::{matches_filters, TransactionStore};
use crate::error::OrchestrationError;
use crate::filters::FilterSet;
use crate::models::{Transaction, DIRECTION_INFLOW, DIRECTION_OUTFLOW};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(transactions)),
        }
    }

    pub async fn insert(&self, tx: Transaction) {
        self.transactions.write().await.push(tx);
    }

    async fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.read().await.clone()
    }
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn count(&self, filters: &FilterSet) -> Result<usize> {
        let snapshot = self.snapshot().await;
        let filters = filters.clone();
        run_on_worker(move || {
            snapshot
                .iter()
                .filter(|tx| matches_filters(tx, &filters))
                .count()
        })
        .await
    }

    async fn fetch(
        &self,
        filters: &FilterSet,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let snapshot = self.snapshot().await;
        let filters = filters.clone();
        run_on_worker(move || {
            let mut rows: Vec<Transaction> = snapshot
                .into_iter()
                .filter(|tx| matches_filters(tx, &filters))
                .collect();
            // Newest first; id breaks date ties so pagination stays stable.
            rows.sort_by(|a, b| b.val_date.cmp(&a.val_date).then(b.id.cmp(&a.id)));
            rows.into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect()
        })
        .await
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        let mut rows = self.snapshot().await;
        rows.sort_by(|a, b| a.val_date.cmp(&b.val_date).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

async fn run_on_worker<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| OrchestrationError::StoreError(format!("query worker failed: {}", e)))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid seed date")
}

struct Seed {
    val_date: NaiveDate,
    amount: Option<f64>,
    direction: i64,
    trx_type_name: &'static str,
    creditor: Option<&'static str>,
    debitor: Option<&'static str>,
    country: Option<&'static str>,
    pos: Option<&'static str>,
}

/// A few months of representative account activity: salary inflows, rent
/// and streaming subscriptions (recurring), and assorted card payments.
pub fn sample_transactions() -> Vec<Transaction> {
    let seeds = [
        Seed { val_date: date(2025, 1, 25), amount: Some(6400.0), direction: DIRECTION_INFLOW, trx_type_name: "Salary", creditor: None, debitor: Some("Acme Industries AG"), country: None, pos: None },
        Seed { val_date: date(2025, 2, 25), amount: Some(6400.0), direction: DIRECTION_INFLOW, trx_type_name: "Salary", creditor: None, debitor: Some("Acme Industries AG"), country: None, pos: None },
        Seed { val_date: date(2025, 3, 25), amount: Some(6400.0), direction: DIRECTION_INFLOW, trx_type_name: "Salary", creditor: None, debitor: Some("Acme Industries AG"), country: None, pos: None },
        Seed { val_date: date(2025, 1, 1), amount: Some(1850.0), direction: DIRECTION_OUTFLOW, trx_type_name: "Standing order", creditor: Some("Wohnbau Zurich AG"), debitor: None, country: Some("Switzerland"), pos: None },
        Seed { val_date: date(2025, 1, 31), amount: Some(1850.0), direction: DIRECTION_OUTFLOW, trx_type_name: "Standing order", creditor: Some("Wohnbau Zurich AG"), debitor: None, country: Some("Switzerland"), pos: None },
        Seed { val_date: date(2025, 3, 2), amount: Some(1850.0), direction: DIRECTION_OUTFLOW, trx_type_name: "Standing order", creditor: Some("Wohnbau Zurich AG"), debitor: None, country: Some("Switzerland"), pos: None },
        Seed { val_date: date(2025, 1, 10), amount: Some(17.90), direction: DIRECTION_OUTFLOW, trx_type_name: "Card payment", creditor: Some("NETFLIX INTERNATIONAL B.V."), debitor: None, country: Some("Netherlands"), pos: Some("netflix.com") },
        Seed { val_date: date(2025, 2, 9), amount: Some(17.90), direction: DIRECTION_OUTFLOW, trx_type_name: "Card payment", creditor: Some("NETFLIX INTERNATIONAL B.V."), debitor: None, country: Some("Netherlands"), pos: Some("netflix.com") },
        Seed { val_date: date(2025, 3, 11), amount: Some(17.90), direction: DIRECTION_OUTFLOW, trx_type_name: "Card payment", creditor: Some("NETFLIX INTERNATIONAL B.V."), debitor: None, country: Some("Netherlands"), pos: Some("netflix.com") },
        Seed { val_date: date(2025, 1, 14), amount: Some(84.35), direction: DIRECTION_OUTFLOW, trx_type_name: "Card payment", creditor: Some("Coop Genossenschaft"), debitor: None, country: Some("Switzerland"), pos: Some("Coop, Bahnhofbruecke Zuerich") },
        Seed { val_date: date(2025, 2, 3), amount: Some(112.60), direction: DIRECTION_OUTFLOW, trx_type_name: "Card payment", creditor: Some("Migros Genossenschaft"), debitor: None, country: Some("Switzerland"), pos: Some("Migros City Zuerich") },
        Seed { val_date: date(2025, 2, 17), amount: Some(64.00), direction: DIRECTION_OUTFLOW, trx_type_name: "Card payment", creditor: Some("Ristorante Molino"), debitor: None, country: Some("Switzerland"), pos: Some("Molino, Limmatquai") },
        Seed { val_date: date(2025, 3, 6), amount: Some(239.0), direction: DIRECTION_OUTFLOW, trx_type_name: "E-banking order", creditor: Some("Galaxus AG"), debitor: None, country: Some("Switzerland"), pos: None },
        Seed { val_date: date(2025, 3, 18), amount: None, direction: DIRECTION_OUTFLOW, trx_type_name: "Card reservation", creditor: Some("SBB CFF FFS"), debitor: None, country: Some("Switzerland"), pos: Some("sbb.ch") },
    ];

    seeds
        .into_iter()
        .enumerate()
        .map(|(i, seed)| Transaction {
            id: i as i64 + 1,
            val_date: seed.val_date,
            trx_date: Some(seed.val_date),
            amount: seed.amount,
            direction: seed.direction,
            customer_name: "Maria Muster".into(),
            account_name: "Private Account".into(),
            currency: "CHF".into(),
            produkt: Some("Privatkonto".into()),
            trx_type_name: seed.trx_type_name.into(),
            trx_type_short: None,
            buchungs_art_name: Some(if seed.direction == DIRECTION_INFLOW {
                "Credit".into()
            } else {
                "Debit".into()
            }),
            acquirer_country_name: seed.country.map(str::to_string),
            point_of_sale_and_location: seed.pos.map(str::to_string),
            text_short_creditor: seed.creditor.map(str::to_string),
            text_creditor: seed.creditor.map(str::to_string),
            text_debitor: seed.debitor.map(str::to_string),
            cred_iban: None,
            cred_addr_text: None,
            cred_ref_nr: None,
            cred_info: None,
        })
        .collect()
}
