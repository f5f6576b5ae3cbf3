//! Record sources
//!
//! The pipeline never acquires records itself. A [`RecordSource`] hands over an
//! ordered batch of parsed transactions together with the rows it had to reject,
//! so malformed input is counted instead of aborting the run.

pub mod csv_source;
pub mod synthetic;

pub use csv_source::{read_transactions, CsvRecordSource, REQUIRED_COLUMNS};
pub use synthetic::SyntheticSource;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::Transaction;

/// A row rejected before cleaning because it could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line in the source, header included
    pub line: u64,
    /// Raw id text, when it was readable
    pub id: Option<String>,
    pub message: String,
}

/// One batch of records handed to the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<Transaction>,
    pub rejected: Vec<RowError>,
}

impl SourceBatch {
    pub fn from_records(records: Vec<Transaction>) -> Self {
        Self {
            records,
            rejected: Vec::new(),
        }
    }

    pub fn malformed_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Supplies raw transaction records.
pub trait RecordSource {
    /// Short label for logs and errors.
    fn name(&self) -> &str;

    /// Produce the next batch. `Ok(None)` means the source has nothing to hand
    /// over at all, which the pipeline treats as a caller error.
    fn load(&mut self) -> Result<Option<SourceBatch>, PipelineError>;
}

/// Fixed in-memory records. Yields its batch once.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    batch: Option<SourceBatch>,
}

impl VecSource {
    pub fn new(records: Vec<Transaction>) -> Self {
        Self {
            batch: Some(SourceBatch::from_records(records)),
        }
    }

    pub fn from_batch(batch: SourceBatch) -> Self {
        Self { batch: Some(batch) }
    }

    /// A source with nothing to supply.
    pub fn exhausted() -> Self {
        Self { batch: None }
    }
}

impl RecordSource for VecSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn load(&mut self) -> Result<Option<SourceBatch>, PipelineError> {
        Ok(self.batch.take())
    }
}
