//! Recurring payment detection
//!
//! A noise-tolerant periodicity detector over outgoing transactions:
//! real recurring payments drift (price changes, skipped months), so both
//! the interval check and the amount check allow a bounded fraction of
//! outliers instead of demanding a strict pattern.

use crate::models::{AmountAnomaly, RecurringPayment, Transaction};
use std::collections::BTreeMap;
use tracing::debug;

/// Tuning knobs for the detector. Defaults target roughly-monthly payments
/// such as rent, subscriptions, and utilities.
#[derive(Debug, Clone)]
pub struct RecurringConfig {
    /// Minimum times a payment must occur to be considered recurring.
    pub min_occurrences: usize,
    /// Minimum days between consecutive payments.
    pub min_interval_days: i64,
    /// Maximum days between consecutive payments.
    pub max_interval_days: i64,
    /// Allowed relative deviation from the baseline amount (0.2 = ±20%).
    pub amount_tolerance: f64,
    /// Fraction of a group allowed to be amount anomalies before the group
    /// is no longer treated as recurring.
    pub anomaly_tolerance: f64,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            min_interval_days: 25,
            max_interval_days: 35,
            amount_tolerance: 0.2,
            anomaly_tolerance: 0.25,
        }
    }
}

/// Detect recurring outgoing payments, grouped by normalized creditor text.
pub fn detect_recurring_payments(
    transactions: &[Transaction],
    config: &RecurringConfig,
) -> Vec<RecurringPayment> {
    // BTreeMap keeps the output order stable across calls.
    let mut groups: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| tx.is_outgoing()) {
        let creditor = normalize_creditor(tx.text_creditor.as_deref());
        groups.entry(creditor).or_default().push(tx);
    }

    let mut recurring = Vec::new();
    for (creditor, mut group) in groups {
        if group.len() < config.min_occurrences {
            continue;
        }
        group.sort_by(|a, b| a.val_date.cmp(&b.val_date).then(a.id.cmp(&b.id)));

        // Most, not all, intervals must look periodic: an isolated gap
        // anomaly such as a skipped month is tolerated.
        let valid_gaps = group
            .windows(2)
            .filter(|pair| {
                let days = (pair[1].val_date - pair[0].val_date).num_days();
                (config.min_interval_days..=config.max_interval_days).contains(&days)
            })
            .count();
        if valid_gaps < config.min_occurrences.saturating_sub(1) {
            continue;
        }

        // Baseline is the earliest payment that carries an amount.
        let Some(base_amount) = group.iter().find_map(|tx| tx.amount) else {
            continue;
        };

        let anomalies: Vec<AmountAnomaly> = group
            .iter()
            .filter(|tx| is_amount_anomaly(tx.amount, base_amount, config.amount_tolerance))
            .map(|tx| AmountAnomaly {
                date: tx.val_date,
                amount: tx.amount,
            })
            .collect();

        let allowed_anomalies = (group.len() as f64 * config.anomaly_tolerance).floor() as usize;
        if anomalies.len() > allowed_anomalies {
            debug!(
                creditor = %creditor,
                anomalies = anomalies.len(),
                allowed = allowed_anomalies,
                "recurring candidate rejected on amount anomalies"
            );
            continue;
        }

        recurring.push(RecurringPayment {
            creditor,
            base_amount,
            occurrences: group.len(),
            last_payment: group[group.len() - 1].val_date,
            anomalies,
        });
    }
    recurring
}

fn normalize_creditor(creditor: Option<&str>) -> String {
    let trimmed = creditor.unwrap_or("").trim();
    if trimmed.is_empty() {
        "UNKNOWN".to_string()
    } else {
        trimmed.to_uppercase()
    }
}

fn is_amount_anomaly(amount: Option<f64>, base_amount: f64, tolerance: f64) -> bool {
    match amount {
        Some(a) => (a - base_amount).abs() > base_amount.abs() * tolerance,
        // A missing amount cannot be validated against the baseline.
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn outgoing(id: i64, creditor: &str, date: NaiveDate, amount: Option<f64>) -> Transaction {
        Transaction {
            id,
            val_date: date,
            trx_date: Some(date),
            amount,
            direction: crate::models::DIRECTION_OUTFLOW,
            customer_name: "Maria Muster".into(),
            account_name: "Private Account".into(),
            currency: "CHF".into(),
            produkt: None,
            trx_type_name: "Standing order".into(),
            trx_type_short: None,
            buchungs_art_name: None,
            acquirer_country_name: None,
            point_of_sale_and_location: None,
            text_short_creditor: None,
            text_creditor: Some(creditor.into()),
            text_debitor: None,
            cred_iban: None,
            cred_addr_text: None,
            cred_ref_nr: None,
            cred_info: None,
        }
    }

    fn monthly_series(creditor: &str, amounts: &[f64]) -> Vec<Transaction> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                outgoing(
                    i as i64 + 1,
                    creditor,
                    day(2025, 1, 15) + chrono::Duration::days(30 * i as i64),
                    Some(*amount),
                )
            })
            .collect()
    }

    #[test]
    fn test_perfect_monthly_group_is_reported() {
        let txs = monthly_series("Helvetia Rent", &[1500.0, 1500.0, 1500.0]);
        let found = detect_recurring_payments(&txs, &RecurringConfig::default());
        assert_eq!(found.len(), 1);
        let hit = &found[0];
        assert_eq!(hit.creditor, "HELVETIA RENT");
        assert_eq!(hit.base_amount, 1500.0);
        assert_eq!(hit.occurrences, 3);
        assert_eq!(hit.last_payment, day(2025, 3, 16));
        assert!(hit.anomalies.is_empty());
    }

    #[test]
    fn test_too_few_occurrences_is_never_reported() {
        let txs = monthly_series("Gym", &[89.0, 89.0]);
        assert!(detect_recurring_payments(&txs, &RecurringConfig::default()).is_empty());
    }

    #[test]
    fn test_anomaly_budget_boundary_floor_of_group_size() {
        // Size 4: floor(4 * 0.25) = 1 anomaly allowed.
        let one_outlier = monthly_series("Netflix", &[18.0, 18.0, 90.0, 18.0]);
        let found = detect_recurring_payments(&one_outlier, &RecurringConfig::default());
        assert_eq!(found.len(), 1, "one anomaly in four is within budget");
        assert_eq!(found[0].anomalies.len(), 1);
        assert_eq!(found[0].anomalies[0].amount, Some(90.0));

        let two_outliers = monthly_series("Netflix", &[18.0, 90.0, 90.0, 18.0]);
        assert!(
            detect_recurring_payments(&two_outliers, &RecurringConfig::default()).is_empty(),
            "two anomalies in four exceed floor(4 * 0.25)"
        );

        // Size 3: floor(3 * 0.25) = 0, so any anomaly excludes the group.
        let minimal = monthly_series("Spotify", &[13.0, 13.0, 65.0]);
        assert!(detect_recurring_payments(&minimal, &RecurringConfig::default()).is_empty());
    }

    #[test]
    fn test_skipped_month_is_tolerated() {
        let dates = [
            day(2025, 1, 1),
            day(2025, 1, 31),
            day(2025, 3, 2),
            // 60-day hole where February's payment was skipped.
            day(2025, 5, 1),
            day(2025, 5, 31),
        ];
        let txs: Vec<Transaction> = dates
            .iter()
            .enumerate()
            .map(|(i, d)| outgoing(i as i64, "Sanitas", *d, Some(240.0)))
            .collect();
        let found = detect_recurring_payments(&txs, &RecurringConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].occurrences, 5);
    }

    #[test]
    fn test_weekly_payments_are_not_monthly_recurring() {
        let txs: Vec<Transaction> = (0..5)
            .map(|i| {
                outgoing(
                    i,
                    "Coop",
                    day(2025, 6, 1) + chrono::Duration::days(7 * i),
                    Some(55.0),
                )
            })
            .collect();
        assert!(detect_recurring_payments(&txs, &RecurringConfig::default()).is_empty());
    }

    #[test]
    fn test_incoming_transactions_are_ignored() {
        let mut txs = monthly_series("Employer AG", &[5200.0, 5200.0, 5200.0]);
        for tx in &mut txs {
            tx.direction = crate::models::DIRECTION_INFLOW;
        }
        assert!(detect_recurring_payments(&txs, &RecurringConfig::default()).is_empty());
    }

    #[test]
    fn test_missing_amount_counts_as_anomaly() {
        let mut txs = monthly_series("Swisscom", &[80.0, 80.0, 80.0, 80.0]);
        txs[2].amount = None;
        let found = detect_recurring_payments(&txs, &RecurringConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].anomalies.len(), 1);
        assert_eq!(found[0].anomalies[0].amount, None);
    }

    #[test]
    fn test_creditor_grouping_is_case_insensitive() {
        let mut txs = monthly_series("migros", &[120.0, 120.0]);
        txs.push(outgoing(99, "  MIGROS ", day(2025, 3, 16), Some(120.0)));
        let found = detect_recurring_payments(&txs, &RecurringConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].creditor, "MIGROS");
        assert_eq!(found[0].occurrences, 3);
    }
}
