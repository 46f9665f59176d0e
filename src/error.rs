use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy shared by every pipeline stage
// ---------------------------------------------------------------------------

/// Errors raised by the plate processing core.
#[derive(Error, Debug)]
pub enum PlateError {
    /// Malformed or ambiguous well-address input, reported verbatim.
    #[error("'{input}' is no valid input for blank wells: {reason}")]
    InvalidWellSpecification { input: String, reason: String },

    /// Non-numeric text where a reading was expected.
    #[error("line {line}, column '{column}': '{token}' is not a number")]
    MalformedReading {
        line: usize,
        column: String,
        token: String,
    },

    #[error("line {line}: expected {expected} values but found {found}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// Blank-well list empty or not present in the table.
    #[error("no blank readings available: {0}")]
    EmptyBlankSet(String),

    #[error("could not detect OD/reporter blocks: {0}")]
    ShapeNotDetected(String),

    #[error("invalid merge input: {0}")]
    InvalidMergeInput(String),

    #[error("unequal numbers of {what}: {left} vs {right}")]
    UnequalCardinality {
        what: String,
        left: usize,
        right: usize,
    },

    #[error("column '{column}' holds {found} cycles but the table holds {expected}")]
    CycleCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("header cell '{0}' is not of the form '<construct>,<condition>'")]
    MalformedHeader(String),

    #[error("curve '{curve}' has no condition '{condition}'")]
    UnknownCondition { curve: String, condition: String },

    #[error("'{0}' holds no data rows")]
    EmptyTable(String),

    #[error("no intermediate result files found in {0}")]
    NoInputFiles(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Result type for the plate processing core.
pub type Result<T> = std::result::Result<T, PlateError>;
