//! Vertical atmospheric profile at a station.

use crate::error::{ProfileError, ProfileResult};

/// Per-level profile values, index 0 is the lowest pressure (highest
/// altitude) level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtmosphericProfile {
    /// mbar
    pub pressure: Vec<f64>,
    /// Geopotential height, m
    pub height: Vec<f64>,
    /// K
    pub temperature: Vec<f64>,
    /// Ozone volume mixing ratio
    pub o3_vmr: Vec<f64>,
    /// Relative humidity, percent
    pub relative_humidity: Vec<f64>,
    /// Cloud liquid water mixing ratio, kg/kg
    pub cloud_lmr: Vec<f64>,
    /// Cloud ice mixing ratio, kg/kg
    pub cloud_imr: Vec<f64>,
}

impl AtmosphericProfile {
    /// Empty profile with room for `levels` entries.
    pub fn with_capacity(levels: usize) -> Self {
        Self {
            pressure: Vec::with_capacity(levels),
            height: Vec::with_capacity(levels),
            temperature: Vec::with_capacity(levels),
            o3_vmr: Vec::with_capacity(levels),
            relative_humidity: Vec::with_capacity(levels),
            cloud_lmr: Vec::with_capacity(levels),
            cloud_imr: Vec::with_capacity(levels),
        }
    }

    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    fn columns(&self) -> [(&'static str, &[f64]); 7] {
        [
            ("pressure", self.pressure.as_slice()),
            ("height", self.height.as_slice()),
            ("temperature", self.temperature.as_slice()),
            ("o3_vmr", self.o3_vmr.as_slice()),
            ("relative_humidity", self.relative_humidity.as_slice()),
            ("cloud_lmr", self.cloud_lmr.as_slice()),
            ("cloud_imr", self.cloud_imr.as_slice()),
        ]
    }

    /// Check the structural invariants layer construction relies on.
    pub fn validate(&self) -> ProfileResult<()> {
        let n = self.len();
        if n < 2 {
            return Err(ProfileError::InconsistentProfile(format!(
                "need at least two levels, got {}",
                n
            )));
        }

        for (name, column) in self.columns() {
            if column.len() != n {
                return Err(ProfileError::InconsistentProfile(format!(
                    "{} has {} entries, expected {}",
                    name,
                    column.len(),
                    n
                )));
            }
            if let Some(i) = column.iter().position(|x| !x.is_finite()) {
                return Err(ProfileError::InconsistentProfile(format!(
                    "{} is not finite at level {}",
                    name, i
                )));
            }
        }

        if let Some(i) = self.pressure.windows(2).position(|w| w[0] >= w[1] || w[0] <= 0.0) {
            return Err(ProfileError::InconsistentProfile(format!(
                "pressure not strictly increasing at level {}",
                i + 1
            )));
        }
        if let Some(i) = self.height.windows(2).position(|w| w[0] <= w[1]) {
            return Err(ProfileError::InconsistentProfile(format!(
                "height not strictly decreasing at level {}",
                i + 1
            )));
        }

        Ok(())
    }
}
