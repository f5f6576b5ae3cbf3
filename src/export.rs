//! Header-plus-rows CSV output for raw batches, cleaned records and aggregates.

use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

use crate::analytics::Aggregation;
use crate::error::PipelineError;
use crate::models::{amount_serde, Amount, CleanedTransaction, IssueFlag, Month, Quarter, Transaction};

/// Flat view of a cleaned record; the csv writer cannot flatten nested structs.
#[derive(Serialize)]
struct CleanedRow<'a> {
    id: i64,
    date: NaiveDate,
    category: &'a str,
    region: &'a str,
    channel: &'a str,
    customer_segment: &'a str,
    quantity: i64,
    #[serde(with = "amount_serde")]
    unit_price: Amount,
    #[serde(with = "amount_serde")]
    revenue: Amount,
    #[serde(with = "amount_serde")]
    cost: Amount,
    #[serde(with = "amount_serde")]
    profit: Amount,
    payment_method: Option<&'a str>,
    customer_satisfaction: Option<f64>,
    issue_flag: IssueFlag,
    profit_margin: Option<f64>,
    month: Month,
    quarter: Quarter,
}

impl<'a> From<&'a CleanedTransaction> for CleanedRow<'a> {
    fn from(record: &'a CleanedTransaction) -> Self {
        let tx = &record.transaction;
        Self {
            id: tx.id,
            date: tx.date,
            category: &tx.category,
            region: &tx.region,
            channel: &tx.channel,
            customer_segment: &tx.customer_segment,
            quantity: tx.quantity,
            unit_price: tx.unit_price,
            revenue: tx.revenue,
            cost: tx.cost,
            profit: tx.profit,
            payment_method: tx.payment_method.as_deref(),
            customer_satisfaction: tx.customer_satisfaction,
            issue_flag: tx.issue_flag,
            profit_margin: record.profit_margin,
            month: record.month,
            quarter: record.quarter,
        }
    }
}

/// Write raw transactions in the layout `read_transactions` accepts.
pub fn write_transactions<W: Write>(records: &[Transaction], writer: W) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    flush(writer)
}

pub fn write_cleaned<'a, W: Write>(
    records: impl IntoIterator<Item = &'a CleanedTransaction>,
    writer: W,
) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(CleanedRow::from(record))?;
    }
    flush(writer)
}

pub fn write_aggregation<W: Write>(aggregation: &Aggregation, writer: W) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(writer);
    match aggregation {
        Aggregation::Rows(rows) => {
            for row in rows {
                writer.serialize(row)?;
            }
        }
        Aggregation::Shares(slices) => {
            for slice in slices {
                writer.serialize(slice)?;
            }
        }
    }
    flush(writer)
}

fn flush<W: Write>(mut writer: csv::Writer<W>) -> Result<(), PipelineError> {
    writer.flush().map_err(|e| PipelineError::Io {
        path: "<csv output>".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{aggregate, Dimension};
    use crate::analytics::test_support::{cleaned, date};

    #[test]
    fn test_cleaned_csv_layout() {
        let mut records = vec![cleaned(1, "Books", "North", "Online", "Budget", date(2024, 3, 1), 200.0, 50.0)];
        records.push(cleaned(2, "Books", "North", "Online", "Budget", date(2024, 12, 1), 0.0, 0.0));

        let mut out = Vec::new();
        write_cleaned(&records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "id,date,category,region,channel,customer_segment,quantity,unit_price,revenue,cost,profit,payment_method,customer_satisfaction,issue_flag,profit_margin,month,quarter"
        );
        assert_eq!(lines[1], "1,2024-03-01,Books,North,Online,Budget,2,100.0,200.0,150.0,50.0,,,none,25.0,Mar,Q1");
        assert!(lines[2].ends_with(",none,,Dec,Q4"));
    }

    #[test]
    fn test_aggregation_csv() {
        let records = vec![cleaned(1, "Books", "North", "Online", "Budget", date(2024, 3, 1), 200.0, 50.0)];

        let mut out = Vec::new();
        write_aggregation(&aggregate(Dimension::CustomerSegment, &records), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "key,revenue,profit,count,avg_value\nBudget,200.0,50.0,1,200.0\n");

        let mut out = Vec::new();
        write_aggregation(&aggregate(Dimension::Channel, &records), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "name,value,share_pct\nOnline,200.0,100.0\n");
    }
}
