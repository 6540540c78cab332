use std::path::PathBuf;
use thiserror::Error;

/// Error type for failed anomaly computations.
///
/// Every variant aborts the run: there is no partial report.
#[derive(Error, Debug)]
pub enum DeltaTError {
    #[error("Cannot read forcing data from {}: {details}", path.display())]
    DataAccess { path: PathBuf, details: String },
    #[error("Unexpected layout for variable '{variable}': {details}")]
    Schema { variable: String, details: String },
    #[error("Scenario '{scenario}' has {available} months of data but the {year} window needs {required}")]
    InsufficientData {
        scenario: String,
        year: i32,
        required: usize,
        available: usize,
    },
    #[error("{axis} coordinates are not rectilinear: index {index} deviates by {deviation} degrees")]
    GridIrregularity {
        axis: String,
        index: usize,
        deviation: f64,
    },
    #[error("No finite cells to average over ({context})")]
    NoValidCells { context: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Cannot render report: {0}")]
    Output(String),
}

/// Convenience type for `Result<T, DeltaTError>`.
pub type DeltaTResult<T> = Result<T, DeltaTError>;
