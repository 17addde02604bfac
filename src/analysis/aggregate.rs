//! Transaction aggregations
//!
//! Plain summary statistics over a slice of transactions. Records without
//! an amount are skipped by the amount-based aggregates.

use crate::models::{Transaction, DIRECTION_INFLOW, DIRECTION_OUTFLOW};
use serde::Serialize;
use std::collections::BTreeMap;

pub fn sum_amounts(transactions: &[Transaction]) -> f64 {
    transactions.iter().filter_map(|tx| tx.amount).sum()
}

pub fn average_amount(transactions: &[Transaction]) -> f64 {
    let amounts: Vec<f64> = transactions.iter().filter_map(|tx| tx.amount).collect();
    if amounts.is_empty() {
        0.0
    } else {
        amounts.iter().sum::<f64>() / amounts.len() as f64
    }
}

pub fn median_amount(transactions: &[Transaction]) -> f64 {
    let mut amounts: Vec<f64> = transactions.iter().filter_map(|tx| tx.amount).collect();
    if amounts.is_empty() {
        return 0.0;
    }
    amounts.sort_by(f64::total_cmp);
    let mid = amounts.len() / 2;
    if amounts.len() % 2 == 1 {
        amounts[mid]
    } else {
        (amounts[mid - 1] + amounts[mid]) / 2.0
    }
}

pub fn min_transaction(transactions: &[Transaction]) -> Option<&Transaction> {
    transactions
        .iter()
        .filter(|tx| tx.amount.is_some())
        .min_by(|a, b| f64::total_cmp(&a.amount.unwrap_or(0.0), &b.amount.unwrap_or(0.0)))
}

pub fn max_transaction(transactions: &[Transaction]) -> Option<&Transaction> {
    transactions
        .iter()
        .filter(|tx| tx.amount.is_some())
        .max_by(|a, b| f64::total_cmp(&a.amount.unwrap_or(0.0), &b.amount.unwrap_or(0.0)))
}

/// Occurrence counts keyed by transaction-type name.
pub fn count_by_type(transactions: &[Transaction]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for tx in transactions {
        *counts.entry(tx.trx_type_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Amount totals keyed by `YYYY-MM` of the value date.
pub fn monthly_totals(transactions: &[Transaction]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for tx in transactions {
        if let Some(amount) = tx.amount {
            let month = tx.val_date.format("%Y-%m").to_string();
            *totals.entry(month).or_insert(0.0) += amount;
        }
    }
    totals
}

/// Aggregate view handed to the advisor agent as tool output.
#[derive(Debug, Clone, Serialize)]
pub struct SpendingSummary {
    pub transaction_count: usize,
    pub total_outgoing: f64,
    pub total_incoming: f64,
    pub average_amount: f64,
    pub median_amount: f64,
    pub monthly_totals: BTreeMap<String, f64>,
    pub count_by_type: BTreeMap<String, usize>,
}

pub fn summarize(transactions: &[Transaction]) -> SpendingSummary {
    let outgoing: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| tx.direction == DIRECTION_OUTFLOW)
        .cloned()
        .collect();
    let incoming: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| tx.direction == DIRECTION_INFLOW)
        .cloned()
        .collect();

    SpendingSummary {
        transaction_count: transactions.len(),
        total_outgoing: sum_amounts(&outgoing),
        total_incoming: sum_amounts(&incoming),
        average_amount: average_amount(transactions),
        median_amount: median_amount(transactions),
        monthly_totals: monthly_totals(transactions),
        count_by_type: count_by_type(transactions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(id: i64, date: (i32, u32, u32), amount: Option<f64>, direction: i64) -> Transaction {
        Transaction {
            id,
            val_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
            trx_date: None,
            amount,
            direction,
            customer_name: "Maria Muster".into(),
            account_name: "Private Account".into(),
            currency: "CHF".into(),
            produkt: None,
            trx_type_name: "Card payment".into(),
            trx_type_short: None,
            buchungs_art_name: None,
            acquirer_country_name: None,
            point_of_sale_and_location: None,
            text_short_creditor: None,
            text_creditor: None,
            text_debitor: None,
            cred_iban: None,
            cred_addr_text: None,
            cred_ref_nr: None,
            cred_info: None,
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        let odd = vec![
            tx(1, (2025, 1, 1), Some(10.0), DIRECTION_OUTFLOW),
            tx(2, (2025, 1, 2), Some(30.0), DIRECTION_OUTFLOW),
            tx(3, (2025, 1, 3), Some(20.0), DIRECTION_OUTFLOW),
        ];
        assert_eq!(median_amount(&odd), 20.0);

        let even = vec![
            tx(1, (2025, 1, 1), Some(10.0), DIRECTION_OUTFLOW),
            tx(2, (2025, 1, 2), Some(20.0), DIRECTION_OUTFLOW),
            tx(3, (2025, 1, 3), Some(30.0), DIRECTION_OUTFLOW),
            tx(4, (2025, 1, 4), Some(40.0), DIRECTION_OUTFLOW),
        ];
        assert_eq!(median_amount(&even), 25.0);
        assert_eq!(median_amount(&[]), 0.0);
    }

    #[test]
    fn test_missing_amounts_are_skipped() {
        let txs = vec![
            tx(1, (2025, 1, 1), Some(100.0), DIRECTION_OUTFLOW),
            tx(2, (2025, 1, 2), None, DIRECTION_OUTFLOW),
        ];
        assert_eq!(sum_amounts(&txs), 100.0);
        assert_eq!(average_amount(&txs), 100.0);
        assert_eq!(min_transaction(&txs).map(|t| t.id), Some(1));
    }

    #[test]
    fn test_monthly_totals_buckets_by_value_date() {
        let txs = vec![
            tx(1, (2025, 1, 5), Some(10.0), DIRECTION_OUTFLOW),
            tx(2, (2025, 1, 25), Some(15.0), DIRECTION_OUTFLOW),
            tx(3, (2025, 2, 1), Some(40.0), DIRECTION_OUTFLOW),
        ];
        let totals = monthly_totals(&txs);
        assert_eq!(totals.get("2025-01"), Some(&25.0));
        assert_eq!(totals.get("2025-02"), Some(&40.0));
    }

    #[test]
    fn test_summary_splits_directions() {
        let txs = vec![
            tx(1, (2025, 1, 1), Some(100.0), DIRECTION_OUTFLOW),
            tx(2, (2025, 1, 2), Some(60.0), DIRECTION_OUTFLOW),
            tx(3, (2025, 1, 3), Some(5000.0), DIRECTION_INFLOW),
        ];
        let summary = summarize(&txs);
        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.total_outgoing, 160.0);
        assert_eq!(summary.total_incoming, 5000.0);
        assert_eq!(summary.count_by_type.get("Card payment"), Some(&3));
    }
}
