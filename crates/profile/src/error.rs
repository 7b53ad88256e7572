//! Error types for profile extraction and layer construction.

use grib2_parser::Grib2Error;
use thiserror::Error;

pub type ProfileResult<T> = Result<T, ProfileError>;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("GRIB2 decode failed: {0}")]
    Decode(#[from] Grib2Error),

    #[error("Mandatory field {field} missing at {level_mbar} mbar")]
    MissingField { field: &'static str, level_mbar: u32 },

    #[error("Mandatory field {field} is not finite at {level_mbar} mbar")]
    NonFiniteField { field: &'static str, level_mbar: u32 },

    #[error("Inconsistent profile: {0}")]
    InconsistentProfile(String),

    #[error("Station altitude {altitude} m is above the top of the profile ({top} m)")]
    StationAboveProfile { altitude: f64, top: f64 },
}
