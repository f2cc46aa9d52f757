//! Error types for the analytics engine.
//!
//! Input errors (missing columns, empty datasets, malformed triangles) fail
//! fast with a descriptive variant. Numerical degrades (Cox non-convergence,
//! optimizer failures, spline fallbacks) are *not* errors: they are recorded
//! inside the result payloads so the rest of the analysis still populates.

use thiserror::Error;

/// Top-level error type for all engine entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required column could not be resolved from the dataset headers.
    #[error("missing {role} column; tried: {tried:?}")]
    MissingColumn {
        /// Role of the column that could not be found (e.g. "time", "event").
        role: &'static str,
        /// Candidate names that were tried before giving up.
        tried: Vec<String>,
    },

    /// No valid data rows remain after dropping missing/non-numeric values.
    #[error("no valid data rows after cleaning")]
    EmptyDataset,

    /// An input precondition was violated (array lengths, value ranges).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Not enough data to run the requested computation.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// CSV parsing failure in one of the loaders.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure while reading input files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
