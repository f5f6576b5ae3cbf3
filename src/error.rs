//! Errors that escape the pipeline.
//!
//! Defective records never surface here: malformed rows, zero denominators and
//! empty working sets are all absorbed by the stage that meets them. Only
//! preconditions the caller controls fail the run.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Invalid pipeline configuration.
    Config { message: String },
    /// A record source produced no batch at all.
    MissingInput { source: String },
    /// The CSV header lacks required columns.
    MissingColumns { columns: Vec<String> },
    /// A filter value outside the dimension's known value set.
    UnknownDimensionValue { dimension: String, value: String },
    /// Reading or writing a file failed.
    Io { path: String, message: String },
    /// The CSV reader or writer failed outside of a single row.
    Csv { message: String },
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Configuration-class errors are the caller's fault and map to exit code 2.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::MissingInput { .. }
                | Self::MissingColumns { .. }
                | Self::UnknownDimensionValue { .. }
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            Self::MissingInput { source } => {
                write!(f, "Record source '{}' supplied no input batch", source)
            }
            Self::MissingColumns { columns } => {
                write!(f, "Missing required columns: {}", columns.join(", "))
            }
            Self::UnknownDimensionValue { dimension, value } => {
                write!(f, "Unknown {} value: '{}'", dimension, value)
            }
            Self::Io { path, message } => write!(f, "I/O error on {}: {}", path, message),
            Self::Csv { message } => write!(f, "CSV error: {}", message),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::Csv {
            message: err.to_string(),
        }
    }
}
