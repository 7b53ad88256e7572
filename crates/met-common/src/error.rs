//! Error types for shared forecaster types.

use thiserror::Error;

/// Result type alias using MetError.
pub type MetResult<T> = Result<T, MetError>;

/// Errors raised while constructing shared domain values.
#[derive(Debug, Error)]
pub enum MetError {
    #[error("Cycle time {0} is not aligned to a 00/06/12/18 UTC boundary")]
    UnalignedCycle(String),

    #[error("Unknown cycle time format, expecting YYYYMMDD or YYYYMMDDHH: {0}")]
    InvalidCycleFormat(String),

    #[error("Invalid station '{vex}': {message}")]
    InvalidStation { vex: String, message: String },
}
