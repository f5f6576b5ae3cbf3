//! The five cleaning stages.
//!
//! Each stage takes ownership of the previous working set and returns a new
//! one plus the number of records it affected. Order matters: the outlier mean
//! is taken over the set left after deduplication, missing-value removal and
//! sign normalization.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{is_missing, Amount, CleanedTransaction, Month, Transaction};

/// Output of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput<T> {
    pub records: Vec<T>,
    pub affected: usize,
}

/// Keep the first record seen for each id, in input order.
pub fn deduplicate(records: Vec<Transaction>) -> StageOutput<Transaction> {
    let mut seen = HashSet::with_capacity(records.len());
    let before = records.len();
    let kept: Vec<Transaction> = records
        .into_iter()
        .filter(|record| seen.insert(record.id))
        .collect();
    let affected = before - kept.len();
    debug!(stage = "dedup", before, removed = affected, "stage complete");
    StageOutput {
        records: kept,
        affected,
    }
}

/// Drop records with a blank category or customer segment. No imputation.
pub fn drop_missing(records: Vec<Transaction>) -> StageOutput<Transaction> {
    let before = records.len();
    let kept: Vec<Transaction> = records
        .into_iter()
        .filter(|record| !is_missing(&record.category) && !is_missing(&record.customer_segment))
        .collect();
    let affected = before - kept.len();
    debug!(stage = "missing", before, removed = affected, "stage complete");
    StageOutput {
        records: kept,
        affected,
    }
}

/// Replace negative quantity/revenue with absolute values.
///
/// `cost` and `profit` are left untouched, so a corrected record generally no
/// longer satisfies `profit == revenue - cost`.
pub fn normalize_negatives(records: Vec<Transaction>) -> StageOutput<Transaction> {
    let mut affected = 0;
    let normalized: Vec<Transaction> = records
        .into_iter()
        .map(|record| {
            if !record.has_negative_values() {
                return record;
            }
            affected += 1;
            let fixed = Transaction {
                quantity: record.quantity.saturating_abs(),
                revenue: record.revenue.saturating_abs(),
                ..record
            };
            if !fixed.profit_is_consistent() {
                debug!(
                    id = fixed.id,
                    "normalized record keeps original cost/profit; profit != revenue - cost"
                );
            }
            fixed
        })
        .collect();
    debug!(stage = "negatives", fixed = affected, "stage complete");
    StageOutput {
        records: normalized,
        affected,
    }
}

/// Drop records whose revenue exceeds `multiplier` times the working-set mean.
///
/// An empty working set has no mean and passes through untouched.
pub fn drop_outliers(records: Vec<Transaction>, multiplier: f64) -> StageOutput<Transaction> {
    if records.is_empty() {
        debug!(stage = "outliers", "empty working set, skipping");
        return StageOutput {
            records,
            affected: 0,
        };
    }

    let count = records.len() as Amount;
    let sum: Amount = records
        .iter()
        .fold(0, |acc: Amount, r| acc.saturating_add(r.revenue));
    // revenue > multiplier * sum / count, kept free of the division
    let bound = multiplier * sum as f64;
    let before = records.len();
    let kept: Vec<Transaction> = records
        .into_iter()
        .filter(|record| (record.revenue.saturating_mul(count) as f64) <= bound)
        .collect();
    let affected = before - kept.len();
    debug!(
        stage = "outliers",
        before,
        removed = affected,
        mean_revenue = crate::models::from_amount(sum) / count as f64,
        multiplier,
        "stage complete"
    );
    StageOutput {
        records: kept,
        affected,
    }
}

/// Attach profit margin, month and quarter. Never drops records.
pub fn enrich(records: Vec<Transaction>, margin_decimals: u32) -> Vec<CleanedTransaction> {
    records
        .into_iter()
        .map(|transaction| {
            let month = Month::from_date(transaction.date);
            CleanedTransaction {
                profit_margin: profit_margin(transaction.profit, transaction.revenue, margin_decimals),
                month,
                quarter: month.quarter(),
                transaction,
            }
        })
        .collect()
}

/// `round(profit / revenue * 100, decimals)`, or `None` for zero revenue.
pub fn profit_margin(profit: Amount, revenue: Amount, decimals: u32) -> Option<f64> {
    if revenue == 0 {
        return None;
    }
    let factor = 10f64.powi(decimals as i32);
    let pct = profit as f64 / revenue as f64 * 100.0;
    Some((pct * factor).round() / factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{to_amount, IssueFlag, Quarter};
    use chrono::NaiveDate;

    fn tx(id: i64, revenue: f64) -> Transaction {
        Transaction {
            id,
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            category: "Books".to_string(),
            region: "North".to_string(),
            channel: "Online".to_string(),
            customer_segment: "Regular".to_string(),
            quantity: 1,
            unit_price: to_amount(revenue),
            revenue: to_amount(revenue),
            cost: to_amount(revenue / 2.0),
            profit: to_amount(revenue / 2.0),
            payment_method: None,
            customer_satisfaction: None,
            issue_flag: IssueFlag::None,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut second = tx(1, 999.0);
        second.region = "South".to_string();
        let out = deduplicate(vec![tx(1, 10.0), tx(2, 20.0), second, tx(3, 30.0), tx(2, 5.0)]);

        assert_eq!(out.affected, 2);
        let ids: Vec<i64> = out.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(out.records[0].revenue, to_amount(10.0));
        assert_eq!(out.records[0].region, "North");
    }

    #[test]
    fn test_drop_missing() {
        let mut no_category = tx(2, 10.0);
        no_category.category = String::new();
        let mut blank_segment = tx(3, 10.0);
        blank_segment.customer_segment = "  ".to_string();

        let out = drop_missing(vec![tx(1, 10.0), no_category, blank_segment]);
        assert_eq!(out.affected, 2);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, 1);
    }

    #[test]
    fn test_normalize_negatives_keeps_cost_and_profit() {
        let mut negative = tx(1, 60.0);
        negative.quantity = -3;
        negative.revenue = to_amount(-60.0);
        negative.cost = to_amount(40.0);
        negative.profit = to_amount(-100.0);

        let mut negative_qty_only = tx(2, 10.0);
        negative_qty_only.quantity = -1;

        let out = normalize_negatives(vec![negative, negative_qty_only, tx(3, 10.0)]);
        assert_eq!(out.affected, 2);

        let fixed = &out.records[0];
        assert_eq!(fixed.quantity, 3);
        assert_eq!(fixed.revenue, to_amount(60.0));
        assert_eq!(fixed.cost, to_amount(40.0));
        assert_eq!(fixed.profit, to_amount(-100.0));
        assert!(!fixed.profit_is_consistent());

        assert_eq!(out.records[1].quantity, 1);
        assert_eq!(out.records[2], tx(3, 10.0));
    }

    #[test]
    fn test_outlier_drop_with_known_bound() {
        // mean = 11000 / 11 = 1000, bound = 5000
        let mut records: Vec<Transaction> = (1..=10).map(|id| tx(id, 100.0)).collect();
        records.push(tx(11, 10_000.0));

        let out = drop_outliers(records, 5.0);
        assert_eq!(out.affected, 1);
        assert_eq!(out.records.len(), 10);
        assert!(out.records.iter().all(|r| r.id != 11));
    }

    #[test]
    fn test_outlier_exactly_at_bound_is_kept() {
        // nine at 100 plus one at 900: mean = 180, bound = 900
        let mut records: Vec<Transaction> = (1..=9).map(|id| tx(id, 100.0)).collect();
        records.push(tx(10, 900.0));

        let out = drop_outliers(records, 5.0);
        assert_eq!(out.affected, 0);
        assert_eq!(out.records.len(), 10);
    }

    #[test]
    fn test_extreme_values_saturate() {
        let mut min_quantity = tx(1, 10.0);
        min_quantity.quantity = i64::MIN;
        let mut min_revenue = tx(2, 10.0);
        min_revenue.revenue = Amount::MIN;

        let out = normalize_negatives(vec![min_quantity, min_revenue]);
        assert_eq!(out.affected, 2);
        assert_eq!(out.records[0].quantity, i64::MAX);
        assert_eq!(out.records[1].revenue, Amount::MAX);

        let mut huge = tx(3, 10.0);
        huge.revenue = Amount::MAX / 2 + 1;
        let out = drop_outliers(vec![huge.clone(), huge, tx(4, 10.0)], 5.0);
        assert_eq!(out.records.len() + out.affected, 3);
    }

    #[test]
    fn test_outlier_empty_set() {
        let out = drop_outliers(Vec::new(), 5.0);
        assert_eq!(out.affected, 0);
        assert!(out.records.is_empty());
    }

    #[test]
    fn test_profit_margin() {
        assert_eq!(profit_margin(to_amount(50.0), to_amount(200.0), 2), Some(25.0));
        assert_eq!(profit_margin(to_amount(1.0), to_amount(3.0), 2), Some(33.33));
        assert_eq!(profit_margin(to_amount(-100.0), to_amount(60.0), 2), Some(-166.67));
        assert_eq!(profit_margin(to_amount(5.0), 0, 2), None);
    }

    #[test]
    fn test_enrich_adds_calendar_fields() {
        let mut zero = tx(2, 0.0);
        zero.date = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();

        let enriched = enrich(vec![tx(1, 200.0), zero], 2);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].month, Month::May);
        assert_eq!(enriched[0].quarter, Quarter::Q2);
        assert_eq!(enriched[0].profit_margin, Some(50.0));
        assert_eq!(enriched[1].month, Month::Nov);
        assert_eq!(enriched[1].quarter, Quarter::Q4);
        assert_eq!(enriched[1].profit_margin, None);
    }
}
