//! Delimited-text record source.
//!
//! Rows are parsed into typed [`Transaction`]s before they reach the pipeline.
//! A row with an unparsable, out-of-range or absent required value becomes a
//! [`RowError`]; a header that lacks a required column fails the whole load.
//! `payment_method`, `customer_satisfaction` and `issue_flag` are optional
//! columns.

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{RecordSource, RowError, SourceBatch};
use crate::error::PipelineError;
use crate::models::{try_to_amount, Amount, IssueFlag, Transaction, MAX_ABS_AMOUNT};

/// Columns every input file must name in its header.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "id",
    "date",
    "category",
    "region",
    "channel",
    "customer_segment",
    "quantity",
    "unit_price",
    "revenue",
    "cost",
    "profit",
];

/// Columns read when present.
pub const OPTIONAL_COLUMNS: [&str; 3] = ["payment_method", "customer_satisfaction", "issue_flag"];

/// Reads transactions from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
    label: String,
}

impl CsvRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for CsvRecordSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn load(&mut self) -> Result<Option<SourceBatch>, PipelineError> {
        let file = File::open(&self.path).map_err(|e| PipelineError::Io {
            path: self.label.clone(),
            message: e.to_string(),
        })?;
        read_transactions(file).map(Some)
    }
}

/// Parse every row of a CSV stream into transactions.
pub fn read_transactions<R: Read>(reader: R) -> Result<SourceBatch, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut batch = SourceBatch::default();
    for (index, result) in reader.records().enumerate() {
        // header is line 1
        let fallback_line = index as u64 + 2;
        match result {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
                match columns.parse_row(&record) {
                    Ok(transaction) => batch.records.push(transaction),
                    Err(message) => {
                        let id = columns.raw(&record, "id").map(str::to_string);
                        warn!(line, id = ?id, %message, "rejecting malformed record");
                        batch.rejected.push(RowError { line, id, message });
                    }
                }
            }
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                warn!(line, error = %err, "rejecting unreadable record");
                batch.rejected.push(RowError {
                    line,
                    id: None,
                    message: err.to_string(),
                });
            }
        }
    }

    debug!(
        parsed = batch.records.len(),
        rejected = batch.rejected.len(),
        "csv batch loaded"
    );
    Ok(batch)
}

struct ColumnMap {
    index: HashMap<&'static str, usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, PipelineError> {
        let by_name: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
            .collect();

        let mut index = HashMap::with_capacity(REQUIRED_COLUMNS.len() + OPTIONAL_COLUMNS.len());
        let mut missing = Vec::new();
        for column in REQUIRED_COLUMNS {
            let found = by_name.get(column).or_else(|| match column {
                "id" => by_name.get("transaction_id"),
                _ => None,
            });
            match found {
                Some(&i) => {
                    index.insert(column, i);
                }
                None => missing.push(column.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(PipelineError::MissingColumns { columns: missing });
        }
        for column in OPTIONAL_COLUMNS {
            if let Some(&i) = by_name.get(column) {
                index.insert(column, i);
            }
        }
        Ok(Self { index })
    }

    fn raw<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.index.get(column).and_then(|&i| record.get(i))
    }

    fn required<'r>(&self, record: &'r StringRecord, column: &str) -> Result<&'r str, String> {
        self.raw(record, column)
            .ok_or_else(|| format!("missing field '{}'", column))
    }

    fn parse_row(&self, record: &StringRecord) -> Result<Transaction, String> {
        let issue_flag = self
            .raw(record, "issue_flag")
            .map(IssueFlag::parse_lenient)
            .unwrap_or_default();
        let payment_method = self
            .raw(record, "payment_method")
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);
        let customer_satisfaction = match self.raw(record, "customer_satisfaction") {
            Some(raw) if !raw.is_empty() => Some(parse_score(raw)?),
            _ => None,
        };

        Ok(Transaction {
            id: parse_integer("id", self.required(record, "id")?)?,
            date: parse_date(self.required(record, "date")?)?,
            category: self.required(record, "category")?.to_string(),
            region: self.required(record, "region")?.to_string(),
            channel: self.required(record, "channel")?.to_string(),
            customer_segment: self.required(record, "customer_segment")?.to_string(),
            quantity: parse_quantity(self.required(record, "quantity")?)?,
            unit_price: parse_amount("unit_price", self.required(record, "unit_price")?)?,
            revenue: parse_amount("revenue", self.required(record, "revenue")?)?,
            cost: parse_amount("cost", self.required(record, "cost")?)?,
            profit: parse_amount("profit", self.required(record, "profit")?)?,
            payment_method,
            customer_satisfaction,
            issue_flag,
        })
    }
}

/// Integers may arrive as `12` or, from float-typed exporters, as `12.0`.
fn parse_integer(column: &str, raw: &str) -> Result<i64, String> {
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        // i64::MAX as f64 is 2^63, one past the range
        Ok(value)
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            Ok(value as i64)
        }
        Ok(value) if value.is_finite() && value.fract() == 0.0 => {
            Err(format!("integer out of range for '{}': '{}'", column, raw))
        }
        _ => Err(format!("invalid integer for '{}': '{}'", column, raw)),
    }
}

/// A quantity's magnitude must be representable, so sign normalization stays exact.
fn parse_quantity(raw: &str) -> Result<i64, String> {
    let value = parse_integer("quantity", raw)?;
    match value.checked_abs() {
        Some(_) => Ok(value),
        None => Err(format!("quantity out of range: '{}'", raw)),
    }
}

fn parse_score(raw: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid number for 'customer_satisfaction': '{}'", raw)),
    }
}

fn parse_amount(column: &str, raw: &str) -> Result<Amount, String> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => try_to_amount(value).ok_or_else(|| {
            format!(
                "amount out of range for '{}': '{}' (limit {:e})",
                column, raw, MAX_ABS_AMOUNT
            )
        }),
        _ => Err(format!("invalid number for '{}': '{}'", column, raw)),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| format!("invalid date: '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::to_amount;

    const HEADER: &str =
        "id,date,category,region,channel,customer_segment,quantity,unit_price,revenue,cost,profit,issue_flag";

    fn parse(body: &str) -> SourceBatch {
        let input = format!("{}\n{}", HEADER, body);
        read_transactions(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_valid_rows() {
        let batch = parse(
            "1,2024-03-05,Electronics,North,Online,Premium,2,100.00,200.00,150.00,50.00,none\n\
             2,2024-07-19 10:15:00,,South,In-Store,Regular,1,40.5,40.5,30,10.5,missing_value\n",
        );
        assert_eq!(batch.records.len(), 2);
        assert!(batch.rejected.is_empty());

        let first = &batch.records[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(first.revenue, to_amount(200.0));
        assert_eq!(first.profit, to_amount(50.0));

        let second = &batch.records[1];
        assert_eq!(second.category, "");
        assert_eq!(second.issue_flag, IssueFlag::MissingValue);
        assert_eq!(second.date, NaiveDate::from_ymd_opt(2024, 7, 19).unwrap());
    }

    #[test]
    fn test_malformed_rows_are_counted_not_fatal() {
        let batch = parse(
            "1,2024-03-05,Books,North,Online,Premium,2,10,20,15,5,\n\
             2,not-a-date,Books,North,Online,Premium,2,10,20,15,5,\n\
             3,2024-03-05,Books,North,Online,Premium,two,10,20,15,5,\n\
             4,2024-03-05,Books,North,Online,Premium,2,10,,15,5,\n\
             5,2024-03-05,Books,North\n",
        );
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.malformed_count(), 4);
        assert_eq!(batch.rejected[0].id.as_deref(), Some("2"));
        assert_eq!(batch.rejected[0].line, 3);
        assert!(batch.rejected[3].message.contains("missing field"));
    }

    #[test]
    fn test_missing_column_fails_fast() {
        let input = "id,date,category\n1,2024-01-01,Books\n";
        let err = read_transactions(input.as_bytes()).unwrap_err();
        match err {
            PipelineError::MissingColumns { columns } => {
                assert!(columns.contains(&"revenue".to_string()));
                assert!(!columns.contains(&"id".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transaction_id_alias_and_optional_issue_flag() {
        let input = "transaction_id,date,category,region,channel,customer_segment,quantity,unit_price,revenue,cost,profit\n\
                     7,2024-01-02,Books,East,Online,Budget,3.0,5,15,9,6\n";
        let batch = read_transactions(input.as_bytes()).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, 7);
        assert_eq!(batch.records[0].quantity, 3);
        assert_eq!(batch.records[0].issue_flag, IssueFlag::None);
    }

    #[test]
    fn test_unknown_issue_flag_keeps_row() {
        let batch = parse("1,2024-03-05,Books,North,Online,Premium,2,10,20,15,5,price_error\n");
        assert!(batch.rejected.is_empty());
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].issue_flag, IssueFlag::None);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let batch = parse(
            "1,2024-03-05,Books,North,Online,Premium,-9223372036854775808,10,20,15,5,\n\
             2,2024-03-05,Books,North,Online,Premium,1e30,10,20,15,5,\n\
             3,2024-03-05,Books,North,Online,Premium,2,10,1e34,15,5,\n\
             4,2024-03-05,Books,North,Online,Premium,2,10,inf,15,5,\n\
             5,2024-03-05,Books,North,Online,Premium,9223372036854775807,10,20,15,5,\n",
        );
        assert_eq!(batch.malformed_count(), 4);
        let rejected: Vec<&str> = batch.rejected.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(rejected, vec!["1", "2", "3", "4"]);
        assert!(batch.rejected[1].message.contains("out of range"));
        assert!(batch.rejected[2].message.contains("out of range"));
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].quantity, i64::MAX);
    }

    #[test]
    fn test_optional_payment_columns() {
        let input = "id,date,category,region,channel,customer_segment,quantity,unit_price,revenue,cost,profit,payment_method,customer_satisfaction\n\
                     1,2024-01-02,Books,East,Online,Budget,1,5,5,3,2,Credit Card,4.5\n\
                     2,2024-01-02,Books,East,Online,Budget,1,5,5,3,2,,\n\
                     3,2024-01-02,Books,East,Online,Budget,1,5,5,3,2,Cash,great\n";
        let batch = read_transactions(input.as_bytes()).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].payment_method.as_deref(), Some("Credit Card"));
        assert_eq!(batch.records[0].customer_satisfaction, Some(4.5));
        assert_eq!(batch.records[1].payment_method, None);
        assert_eq!(batch.records[1].customer_satisfaction, None);
        assert_eq!(batch.rejected[0].id.as_deref(), Some("3"));
    }

    #[test]
    fn test_csv_source_missing_file() {
        let mut source = CsvRecordSource::new("/nonexistent/raw.csv");
        assert!(matches!(source.load(), Err(PipelineError::Io { .. })));
    }
}
