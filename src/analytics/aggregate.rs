//! Aggregation engine
//!
//! Every dimension groups into an ordered key → [`Accumulator`] map:
//!
//! | Dimension        | Order                          | Extra                     |
//! |------------------|--------------------------------|---------------------------|
//! | category         | revenue descending, then key   |                           |
//! | region           | first seen                     |                           |
//! | month            | Jan→Dec, all 12 present        | zero-filled               |
//! | channel          | first seen                     | name/value share slices   |
//! | customer segment | first seen                     | `avg_value = revenue / n` |
//!
//! Trend and breakdown series outside the [`Dimension`] set (margin by
//! category, payment methods, daily and month-year revenue) have their own
//! functions below.

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

use super::dimension::Dimension;
use crate::models::{amount_serde, from_amount, Amount, CleanedTransaction, Month};

/// One group's reduced totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    #[serde(with = "amount_serde")]
    pub revenue: Amount,
    #[serde(with = "amount_serde")]
    pub profit: Amount,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_value: Option<f64>,
}

/// Name/value pair for proportion displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareSlice {
    pub name: String,
    #[serde(with = "amount_serde")]
    pub value: Amount,
    /// Share of the total value, 0 when the total is 0
    pub share_pct: f64,
}

/// Mean per-record profit margin of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginRow {
    pub key: String,
    pub avg_margin: f64,
    /// Records with a defined margin
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    #[serde(with = "amount_serde")]
    pub revenue: Amount,
}

/// Month-year revenue bucket; unlike the calendar view, years stay apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: Month,
    /// `"Mar 2024"`
    pub label: String,
    #[serde(with = "amount_serde")]
    pub revenue: Amount,
}

/// Usage and satisfaction of one payment method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethodRow {
    pub method: String,
    #[serde(with = "amount_serde")]
    pub revenue: Amount,
    pub transaction_count: usize,
    /// Mean rating of the method's rated records
    pub avg_satisfaction: Option<f64>,
}

/// Shape-erased result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Aggregation {
    Rows(Vec<AggregateRow>),
    Shares(Vec<ShareSlice>),
}

impl Aggregation {
    pub fn len(&self) -> usize {
        match self {
            Aggregation::Rows(rows) => rows.len(),
            Aggregation::Shares(slices) => slices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub revenue: Amount,
    pub profit: Amount,
    pub count: usize,
}

impl Accumulator {
    #[inline]
    pub fn add(&mut self, record: &CleanedTransaction) {
        self.revenue = self.revenue.saturating_add(record.revenue());
        self.profit = self.profit.saturating_add(record.profit());
        self.count += 1;
    }

    fn into_row(self, key: String) -> AggregateRow {
        AggregateRow {
            key,
            revenue: self.revenue,
            profit: self.profit,
            count: self.count,
            avg_value: None,
        }
    }
}

/// Aggregate along `dimension`.
pub fn aggregate<'a>(
    dimension: Dimension,
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
) -> Aggregation {
    match dimension {
        Dimension::Category => Aggregation::Rows(by_category(records)),
        Dimension::Region => Aggregation::Rows(by_region(records)),
        Dimension::Month => Aggregation::Rows(by_month(records)),
        Dimension::Channel => Aggregation::Shares(by_channel(records)),
        Dimension::CustomerSegment => Aggregation::Rows(by_segment(records)),
    }
}

fn group_first_seen<'a>(
    dimension: Dimension,
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
) -> IndexMap<&'a str, Accumulator> {
    let mut groups: IndexMap<&'a str, Accumulator> = IndexMap::new();
    for record in records {
        groups.entry(dimension.key(record)).or_default().add(record);
    }
    groups
}

fn into_rows(groups: IndexMap<&str, Accumulator>) -> Vec<AggregateRow> {
    groups
        .into_iter()
        .map(|(key, acc)| acc.into_row(key.to_string()))
        .collect()
}

/// Category totals, highest revenue first.
pub fn by_category<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Vec<AggregateRow> {
    let mut rows = into_rows(group_first_seen(Dimension::Category, records));
    rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.key.cmp(&b.key)));
    rows
}

pub fn by_region<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Vec<AggregateRow> {
    into_rows(group_first_seen(Dimension::Region, records))
}

/// Twelve rows, Jan→Dec; months without data carry zeros.
pub fn by_month<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Vec<AggregateRow> {
    let mut months = [Accumulator::default(); 12];
    for record in records {
        months[record.month.index()].add(record);
    }
    Month::ALL
        .iter()
        .zip(months)
        .map(|(month, acc)| acc.into_row(month.as_str().to_string()))
        .collect()
}

/// Channel revenue as share slices.
pub fn by_channel<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Vec<ShareSlice> {
    let groups = group_first_seen(Dimension::Channel, records);
    let total: Amount = groups
        .values()
        .fold(0, |sum: Amount, acc| sum.saturating_add(acc.revenue));
    groups
        .into_iter()
        .map(|(name, acc)| ShareSlice {
            name: name.to_string(),
            value: acc.revenue,
            share_pct: if total == 0 {
                0.0
            } else {
                acc.revenue as f64 / total as f64 * 100.0
            },
        })
        .collect()
}

/// Segment totals with average order value per segment.
pub fn by_segment<'a>(records: impl IntoIterator<Item = &'a CleanedTransaction>) -> Vec<AggregateRow> {
    group_first_seen(Dimension::CustomerSegment, records)
        .into_iter()
        .map(|(key, acc)| {
            // groups only exist once a record was added, so count >= 1
            let avg = from_amount(acc.revenue) / acc.count as f64;
            AggregateRow {
                avg_value: Some(avg),
                ..acc.into_row(key.to_string())
            }
        })
        .collect()
}

/// Mean profit margin per category, highest first. Records without a defined
/// margin are skipped; a category whose records all lack one is omitted.
pub fn margin_by_category<'a>(
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
) -> Vec<MarginRow> {
    let mut groups: IndexMap<&'a str, (f64, usize)> = IndexMap::new();
    for record in records {
        if let Some(margin) = record.profit_margin {
            let entry = groups.entry(record.transaction.category.as_str()).or_default();
            entry.0 += margin;
            entry.1 += 1;
        }
    }
    let mut rows: Vec<MarginRow> = groups
        .into_iter()
        .map(|(key, (sum, count))| MarginRow {
            key: key.to_string(),
            avg_margin: sum / count as f64,
            count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.avg_margin
            .total_cmp(&a.avg_margin)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

/// Revenue per calendar day, oldest first.
pub fn daily_revenue<'a>(
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
) -> Vec<DailyRevenue> {
    let mut days: BTreeMap<NaiveDate, Amount> = BTreeMap::new();
    for record in records {
        let day = days.entry(record.date()).or_default();
        *day = day.saturating_add(record.revenue());
    }
    days.into_iter()
        .map(|(date, revenue)| DailyRevenue { date, revenue })
        .collect()
}

/// Revenue per (year, month), oldest first. Only months with data appear.
pub fn monthly_revenue<'a>(
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
) -> Vec<MonthlyRevenue> {
    let mut buckets: BTreeMap<(i32, Month), Amount> = BTreeMap::new();
    for record in records {
        let bucket = buckets
            .entry((record.date().year(), record.month))
            .or_default();
        *bucket = bucket.saturating_add(record.revenue());
    }
    buckets
        .into_iter()
        .map(|((year, month), revenue)| MonthlyRevenue {
            year,
            month,
            label: format!("{} {}", month, year),
            revenue,
        })
        .collect()
}

/// Revenue, count and mean satisfaction per payment method, by method name.
/// Records without a payment method are left out.
pub fn by_payment_method<'a>(
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
) -> Vec<PaymentMethodRow> {
    #[derive(Default)]
    struct Usage {
        revenue: Amount,
        count: usize,
        satisfaction_sum: f64,
        rated: usize,
    }

    let mut methods: BTreeMap<&'a str, Usage> = BTreeMap::new();
    for record in records {
        let tx = &record.transaction;
        let Some(method) = tx.payment_method.as_deref().map(str::trim) else {
            continue;
        };
        if method.is_empty() {
            continue;
        }
        let usage = methods.entry(method).or_default();
        usage.revenue = usage.revenue.saturating_add(tx.revenue);
        usage.count += 1;
        if let Some(score) = tx.customer_satisfaction {
            usage.satisfaction_sum += score;
            usage.rated += 1;
        }
    }
    methods
        .into_iter()
        .map(|(method, usage)| PaymentMethodRow {
            method: method.to_string(),
            revenue: usage.revenue,
            transaction_count: usage.count,
            avg_satisfaction: (usage.rated > 0)
                .then(|| usage.satisfaction_sum / usage.rated as f64),
        })
        .collect()
}
