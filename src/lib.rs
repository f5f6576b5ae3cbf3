//! Retail ETL Backend Library
//!
//! Cleans a batch of sales transactions and summarizes the result.
//!
//! ```text
//! RecordSource ──▶ EtlPipeline ──▶ FilterSet ──▶ { aggregate, KpiSet }
//!  (csv/synthetic)   (5 stages)     (predicates)
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod etl;
pub mod export;
pub mod ingest;
pub mod models;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use etl::{EtlOutcome, EtlPipeline, EtlReport};
pub use models::{CleanedTransaction, Transaction};
