//! Observing stations.

use serde::{Deserialize, Serialize};

use crate::error::{MetError, MetResult};

/// A telescope site the forecast is computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Two-letter VEX station code, also the output directory name
    pub vex: String,
    #[serde(default)]
    pub name: String,
    /// Degrees north
    pub lat: f64,
    /// Degrees east
    pub lon: f64,
    /// Geopotential altitude in meters
    pub alt: f64,
}

impl Station {
    pub fn new(
        vex: impl Into<String>,
        name: impl Into<String>,
        lat: f64,
        lon: f64,
        alt: f64,
    ) -> Self {
        Self {
            vex: vex.into(),
            name: name.into(),
            lat,
            lon,
            alt,
        }
    }

    /// Reject coordinates the retrieval request could not be built from.
    pub fn validate(&self) -> MetResult<()> {
        let invalid = |message: &str| MetError::InvalidStation {
            vex: self.vex.clone(),
            message: message.to_string(),
        };
        if self.vex.is_empty() {
            return Err(invalid("empty vex code"));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(invalid("latitude out of range"));
        }
        if !(-180.0..=360.0).contains(&self.lon) {
            return Err(invalid("longitude out of range"));
        }
        if !self.alt.is_finite() {
            return Err(invalid("altitude is not a number"));
        }
        Ok(())
    }
}
