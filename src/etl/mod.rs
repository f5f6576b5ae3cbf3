//! Cleaning Pipeline
//!
//! Turns a raw batch into an immutable cleaned set plus an [`EtlReport`].
//!
//! # Stages
//!
//! ```text
//! raw batch ──▶ deduplicate ──▶ drop_missing ──▶ normalize_negatives
//!                                                      │
//!        CleanedTransaction ◀── enrich ◀── drop_outliers
//! ```
//!
//! # Guarantees
//!
//! - **Pure**: the caller's records are never touched; every stage builds a new set
//! - **Deterministic**: the same input always yields the same report and records
//! - **Total**: defective records and empty sets never fail the run
//! - **Shared output**: the cleaned set is an `Arc<[CleanedTransaction]>`, safe
//!   to hand to any number of concurrent readers

pub mod report;
pub mod stages;

pub use report::EtlReport;
pub use stages::{profit_margin, StageOutput};

use std::sync::Arc;

use tracing::info;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::{RecordSource, RowError, SourceBatch};
use crate::models::{CleanedTransaction, Transaction};
use report::StageCounts;

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct EtlOutcome {
    pub report: EtlReport,
    /// Rows rejected by the source before deduplication.
    pub malformed_records: usize,
    pub rejected: Vec<RowError>,
    pub records: Arc<[CleanedTransaction]>,
}

impl EtlOutcome {
    pub fn records(&self) -> &[CleanedTransaction] {
        &self.records
    }

    /// Cheap handle to the shared cleaned set.
    pub fn shared_records(&self) -> Arc<[CleanedTransaction]> {
        Arc::clone(&self.records)
    }
}

#[derive(Debug, Clone)]
pub struct EtlPipeline {
    outlier_multiplier: f64,
    margin_decimals: u32,
}

impl EtlPipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            outlier_multiplier: config.outlier_multiplier,
            margin_decimals: config.margin_decimals,
        })
    }

    /// Clean a batch of already-parsed records.
    pub fn run(&self, records: &[Transaction]) -> EtlOutcome {
        self.run_batch(SourceBatch::from_records(records.to_vec()))
    }

    /// Pull one batch from `source` and clean it.
    pub fn run_source(&self, source: &mut dyn RecordSource) -> Result<EtlOutcome, PipelineError> {
        let batch = source
            .load()?
            .ok_or_else(|| PipelineError::MissingInput {
                source: source.name().to_string(),
            })?;
        info!(source = source.name(), "loaded record batch");
        Ok(self.run_batch(batch))
    }

    pub fn run_batch(&self, batch: SourceBatch) -> EtlOutcome {
        let SourceBatch { records, rejected } = batch;
        let mut counts = StageCounts {
            total_records: records.len(),
            ..StageCounts::default()
        };

        let deduped = stages::deduplicate(records);
        counts.duplicates_removed = deduped.affected;

        let complete = stages::drop_missing(deduped.records);
        counts.missing_values_handled = complete.affected;

        let normalized = stages::normalize_negatives(complete.records);
        counts.negative_values_fixed = normalized.affected;

        let bounded = stages::drop_outliers(normalized.records, self.outlier_multiplier);
        counts.outliers_removed = bounded.affected;

        let cleaned = stages::enrich(bounded.records, self.margin_decimals);
        let report = counts.finish(cleaned.len());

        info!(
            total = report.total_records(),
            duplicates = report.duplicates_removed(),
            missing = report.missing_values_handled(),
            negatives = report.negative_values_fixed(),
            outliers = report.outliers_removed(),
            cleaned = report.records_after_cleaning(),
            malformed = rejected.len(),
            "ETL run complete"
        );

        EtlOutcome {
            report,
            malformed_records: rejected.len(),
            rejected,
            records: cleaned.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::VecSource;
    use crate::models::{to_amount, IssueFlag};
    use chrono::NaiveDate;

    fn tx(id: i64, category: &str, quantity: i64, revenue: f64) -> Transaction {
        Transaction {
            id,
            date: NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
            category: category.to_string(),
            region: "West".to_string(),
            channel: "Online".to_string(),
            customer_segment: "Premium".to_string(),
            quantity,
            unit_price: to_amount(20.0),
            revenue: to_amount(revenue),
            cost: to_amount(40.0),
            profit: to_amount(revenue - 40.0),
            payment_method: Some("Credit Card".to_string()),
            customer_satisfaction: Some(4.0),
            issue_flag: IssueFlag::None,
        }
    }

    fn pipeline() -> EtlPipeline {
        EtlPipeline::new(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_duplicate_then_negative_scenario() {
        // same id twice: the blank-category record comes first and wins dedup,
        // then the missing-value stage drops it
        let records = vec![
            tx(1, "", 2, 40.0),
            tx(1, "Books", -3, -60.0),
            tx(2, "Books", -3, -60.0),
        ];
        let outcome = pipeline().run(&records);

        assert_eq!(outcome.report.total_records(), 3);
        assert_eq!(outcome.report.duplicates_removed(), 1);
        assert_eq!(outcome.report.missing_values_handled(), 1);
        assert_eq!(outcome.report.negative_values_fixed(), 1);
        assert_eq!(outcome.report.outliers_removed(), 0);
        assert_eq!(outcome.report.records_after_cleaning(), 1);

        let survivor = &outcome.records()[0];
        assert_eq!(survivor.id(), 2);
        assert_eq!(survivor.transaction.quantity, 3);
        assert_eq!(survivor.revenue(), to_amount(60.0));
    }

    #[test]
    fn test_outlier_mean_follows_earlier_stages() {
        // Mean is taken over 20 x 100 + 1500 (normalized) + 3000 + 1400 = 7900 / 23,
        // so the cutoff is 1717.39. Counting the late duplicate and the blank
        // category raises it above 3000; counting -1500 before normalization
        // lowers it below 1400.
        let mut records: Vec<Transaction> = (1..=20).map(|id| tx(id, "Books", 1, 100.0)).collect();
        records.push(tx(30, "Books", -1, -1500.0));
        records.push(tx(31, "Electronics", 1, 3000.0));
        records.push(tx(32, "Electronics", 1, 1400.0));
        records.push(tx(1, "Books", 1, 6000.0));
        records.push(tx(40, "", 1, 6000.0));

        let outcome = pipeline().run(&records);
        let report = outcome.report;
        assert_eq!(report.total_records(), 25);
        assert_eq!(report.duplicates_removed(), 1);
        assert_eq!(report.missing_values_handled(), 1);
        assert_eq!(report.negative_values_fixed(), 1);
        assert_eq!(report.outliers_removed(), 1);
        assert_eq!(report.records_after_cleaning(), 22);

        let ids: Vec<i64> = outcome.records().iter().map(|r| r.id()).collect();
        assert!(!ids.contains(&31));
        assert!(ids.contains(&30) && ids.contains(&32));
        assert_eq!(outcome.records()[0].revenue(), to_amount(100.0));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let records = vec![tx(1, "Books", -3, -60.0)];
        let snapshot = records.clone();
        let _ = pipeline().run(&records);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn test_empty_input() {
        let outcome = pipeline().run(&[]);
        assert_eq!(outcome.report, EtlReport::default());
        assert_eq!(outcome.malformed_records, 0);
        assert!(outcome.records().is_empty());
    }

    #[test]
    fn test_exhausted_source_is_config_error() {
        let mut source = VecSource::exhausted();
        let err = pipeline().run_source(&mut source).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }

    #[test]
    fn test_malformed_count_travels_with_report() {
        let batch = SourceBatch {
            records: vec![tx(1, "Books", 1, 20.0)],
            rejected: vec![RowError {
                line: 3,
                id: Some("2".to_string()),
                message: "invalid date: 'x'".to_string(),
            }],
        };
        let outcome = pipeline().run_source(&mut VecSource::from_batch(batch)).unwrap();
        assert_eq!(outcome.malformed_records, 1);
        assert_eq!(outcome.report.total_records(), 1);
        assert_eq!(outcome.report.records_after_cleaning(), 1);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = PipelineConfig {
            outlier_multiplier: -1.0,
            ..PipelineConfig::default()
        };
        assert!(EtlPipeline::new(&config).is_err());
    }
}
