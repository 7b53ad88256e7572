//! Station profile extraction from a NOMADS GRIB2 subset.

use bytes::Bytes;
use grib2_parser::Grib2Tables;
use met_common::{CellBox, LATLON_DELTA, PRESSURE_LEVELS_MBAR};
use serde::Serialize;
use tracing::debug;

use crate::constants::{M_AIR, M_O3};
use crate::error::{ProfileError, ProfileResult};
use crate::fields::{FieldIndex, LevelKey};
use crate::interpolation::{grid_interp, grid_interp_vector};
use crate::profile::AtmosphericProfile;

/// Outcome of sampling one optional field at one level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldSample {
    Sampled(f64),
    /// The field was missing or not finite and the default was used.
    Defaulted(f64),
}

impl FieldSample {
    pub fn value(&self) -> f64 {
        match *self {
            FieldSample::Sampled(x) | FieldSample::Defaulted(x) => x,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, FieldSample::Defaulted(_))
    }
}

/// An optional field that fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultedField {
    pub field: &'static str,
    pub level_mbar: u32,
}

/// Surface and wind diagnostics written alongside the opacity table.
///
/// Fields absent from the payload stay `None` and are omitted when
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuxiliaryFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csnow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicep: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfrzr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wgust: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wind: Option<f64>,
    #[serde(rename = "10m_wind", skip_serializing_if = "Option::is_none")]
    pub wind_10m: Option<f64>,
}

/// Everything extracted from one payload.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub profile: AtmosphericProfile,
    pub auxiliary: AuxiliaryFields,
    pub defaulted: Vec<DefaultedField>,
}

/// Interpolates GFS fields to a station location.
#[derive(Debug, Clone)]
pub struct ProfileExtractor {
    tables: Grib2Tables,
    delta: f64,
    levels: Vec<u32>,
}

impl Default for ProfileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileExtractor {
    pub fn new() -> Self {
        Self {
            tables: Grib2Tables::gfs(),
            delta: LATLON_DELTA,
            levels: PRESSURE_LEVELS_MBAR.to_vec(),
        }
    }

    /// Decode `payload` and build the profile at (`lat`, `lon`).
    pub fn extract(&self, payload: Bytes, lat: f64, lon: f64) -> ProfileResult<Extraction> {
        let cell = CellBox::around(lat, lon, self.delta);
        let (u, v) = cell.fractions(lat, lon);
        let index = FieldIndex::from_payload(payload, self.tables.clone(), &cell)?;
        debug!(fields = index.len(), u, v, "Decoded payload");
        self.extract_from_index(&index, u, v)
    }

    pub fn extract_from_index(
        &self,
        index: &FieldIndex,
        u: f64,
        v: f64,
    ) -> ProfileResult<Extraction> {
        let mut profile = AtmosphericProfile::with_capacity(self.levels.len());
        let mut defaulted = Vec::new();

        for &mbar in &self.levels {
            let level = LevelKey::Isobaric(mbar);

            profile.pressure.push(f64::from(mbar));
            profile.height.push(mandatory(index, "HGT", mbar, u, v)?);
            profile.temperature.push(mandatory(index, "TMP", mbar, u, v)?);

            let mut sample_optional = |field: &'static str| {
                let sample = optional(index, field, level, u, v);
                if sample.is_defaulted() {
                    defaulted.push(DefaultedField {
                        field,
                        level_mbar: mbar,
                    });
                }
                sample.value()
            };

            // Mass mixing ratio to volume mixing ratio
            let o3 = sample_optional("O3MR") * M_AIR / M_O3;
            let rh = sample_optional("RH");
            let lmr = sample_optional("CLWMR");
            let imr = sample_optional("ICMR");

            profile.o3_vmr.push(o3);
            profile.relative_humidity.push(rh);
            profile.cloud_lmr.push(lmr);
            profile.cloud_imr.push(imr);
        }

        Ok(Extraction {
            profile,
            auxiliary: auxiliary_fields(index, u, v),
            defaulted,
        })
    }
}

fn sample(index: &FieldIndex, name: &str, level: LevelKey, u: f64, v: f64) -> Option<f64> {
    index
        .get(name, level)
        .map(|corners| grid_interp(corners, u, v))
        .filter(|x| x.is_finite())
}

fn mandatory(
    index: &FieldIndex,
    field: &'static str,
    mbar: u32,
    u: f64,
    v: f64,
) -> ProfileResult<f64> {
    let corners = index
        .get(field, LevelKey::Isobaric(mbar))
        .ok_or(ProfileError::MissingField {
            field,
            level_mbar: mbar,
        })?;
    let value = grid_interp(corners, u, v);
    if !value.is_finite() {
        return Err(ProfileError::NonFiniteField {
            field,
            level_mbar: mbar,
        });
    }
    Ok(value)
}

fn optional(index: &FieldIndex, field: &str, level: LevelKey, u: f64, v: f64) -> FieldSample {
    match sample(index, field, level, u, v) {
        Some(x) => FieldSample::Sampled(x),
        None => FieldSample::Defaulted(0.0),
    }
}

fn vector(index: &FieldIndex, level: LevelKey, u: f64, v: f64) -> Option<f64> {
    let a = index.get("UGRD", level)?;
    let b = index.get("VGRD", level)?;
    Some(grid_interp_vector(a, b, u, v)).filter(|x| x.is_finite())
}

fn auxiliary_fields(index: &FieldIndex, u: f64, v: f64) -> AuxiliaryFields {
    let surface = |name| sample(index, name, LevelKey::Surface, u, v);
    AuxiliaryFields {
        csnow: surface("CSNOW"),
        cicep: surface("CICEP"),
        cfrzr: surface("CFRZR"),
        crain: surface("CRAIN"),
        wgust: surface("GUST"),
        max_wind: vector(index, LevelKey::MaxWind, u, v),
        wind_10m: vector(index, LevelKey::AboveGround(10), u, v),
    }
}
