use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the aggregation and rendering core.
///
/// All variants are raised synchronously to the caller; nothing is retried
/// or recovered internally, and no partial results are produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeError {
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no records remain after date filtering")]
    EmptyDataset,

    #[error("unrecognized bucket frequency '{0}' (expected daily, weekly or monthly)")]
    InvalidFrequency(String),

    #[error("unsupported graph type '{0}' (expected '2D' or '3D')")]
    UnsupportedGraphType(String),
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;
