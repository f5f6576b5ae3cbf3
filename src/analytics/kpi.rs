//! Headline metrics over a filtered working set.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::{amount_serde, from_amount, Amount, CleanedTransaction};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSet {
    #[serde(with = "amount_serde")]
    pub total_revenue: Amount,
    #[serde(with = "amount_serde")]
    pub total_profit: Amount,
    pub total_transactions: usize,
    pub avg_order_value: f64,
    pub profit_margin_percent: f64,
    pub avg_quantity: f64,
    /// Distinct customer segments present
    pub customer_segments: usize,
    /// Mean rating over records that carry one
    pub avg_satisfaction: Option<f64>,
}

impl KpiSet {
    /// Single pass over the working set. An empty set yields all zeros.
    ///
    /// Totals saturate at the `Amount` range instead of wrapping.
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Self {
        let mut total_revenue: Amount = 0;
        let mut total_profit: Amount = 0;
        let mut total_quantity: i128 = 0;
        let mut count = 0usize;
        let mut segments: HashSet<&'a str> = HashSet::new();
        let mut satisfaction_sum = 0.0;
        let mut rated = 0usize;

        for record in records {
            let tx = &record.transaction;
            total_revenue = total_revenue.saturating_add(tx.revenue);
            total_profit = total_profit.saturating_add(tx.profit);
            total_quantity = total_quantity.saturating_add(tx.quantity as i128);
            count += 1;
            segments.insert(tx.customer_segment.as_str());
            if let Some(score) = tx.customer_satisfaction {
                satisfaction_sum += score;
                rated += 1;
            }
        }

        if count == 0 {
            return Self::default();
        }

        let profit_margin_percent = if total_revenue == 0 {
            0.0
        } else {
            total_profit as f64 / total_revenue as f64 * 100.0
        };

        Self {
            total_revenue,
            total_profit,
            total_transactions: count,
            avg_order_value: from_amount(total_revenue) / count as f64,
            profit_margin_percent,
            avg_quantity: total_quantity as f64 / count as f64,
            customer_segments: segments.len(),
            avg_satisfaction: (rated > 0).then(|| satisfaction_sum / rated as f64),
        }
    }

    pub fn total_revenue_f64(&self) -> f64 {
        from_amount(self.total_revenue)
    }

    pub fn total_profit_f64(&self) -> f64 {
        from_amount(self.total_profit)
    }
}
