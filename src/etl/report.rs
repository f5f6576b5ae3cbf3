//! Cleaning run counters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters for one pipeline run. Built once by the pipeline; read-only after.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtlReport {
    total_records: usize,
    duplicates_removed: usize,
    missing_values_handled: usize,
    negative_values_fixed: usize,
    outliers_removed: usize,
    records_after_cleaning: usize,
}

/// Per-stage counts collected while the pipeline runs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StageCounts {
    pub total_records: usize,
    pub duplicates_removed: usize,
    pub missing_values_handled: usize,
    pub negative_values_fixed: usize,
    pub outliers_removed: usize,
}

impl StageCounts {
    pub(crate) fn finish(self, records_after_cleaning: usize) -> EtlReport {
        EtlReport {
            total_records: self.total_records,
            duplicates_removed: self.duplicates_removed,
            missing_values_handled: self.missing_values_handled,
            negative_values_fixed: self.negative_values_fixed,
            outliers_removed: self.outliers_removed,
            records_after_cleaning,
        }
    }
}

impl EtlReport {
    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates_removed
    }

    pub fn missing_values_handled(&self) -> usize {
        self.missing_values_handled
    }

    pub fn negative_values_fixed(&self) -> usize {
        self.negative_values_fixed
    }

    pub fn outliers_removed(&self) -> usize {
        self.outliers_removed
    }

    pub fn records_after_cleaning(&self) -> usize {
        self.records_after_cleaning
    }

    /// Records dropped by any stage. Negative fixes repair rather than drop.
    pub fn records_dropped(&self) -> usize {
        self.duplicates_removed + self.missing_values_handled + self.outliers_removed
    }
}

impl fmt::Display for EtlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records:          {}", self.total_records)?;
        writeln!(f, "Duplicates removed:     {}", self.duplicates_removed)?;
        writeln!(f, "Missing values handled: {}", self.missing_values_handled)?;
        writeln!(f, "Negative values fixed:  {}", self.negative_values_fixed)?;
        writeln!(f, "Outliers removed:       {}", self.outliers_removed)?;
        write!(f, "Records after cleaning: {}", self.records_after_cleaning)
    }
}
