//! GRIB2 parser (WMO FM 92 GRIB Edition 2) for NOMADS-filtered GFS subsets.
//!
//! Messages are walked by their Section 0 length. Sections 1, 3, 4, 5, 6 and 7
//! are parsed in-crate; simple packing (template 5.0) is unpacked here and any
//! other packing is delegated to the `grib` crate.

pub mod sections;
pub mod tables;
pub mod unpacking;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
pub use tables::{Grib2Tables, LevelDescription, ParamKey};

/// Errors raised while decoding GRIB2 data.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unpacking error: {0}")]
    UnpackingError(String),

    #[error("Unsupported grid: {0}")]
    UnsupportedGrid(String),
}

pub type Grib2Result<T> = Result<T, Grib2Error>;

/// One decoded GRIB2 message (one field on one level).
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    /// The complete message bytes, kept for the `grib` crate fallback.
    pub raw: Bytes,
}

impl Grib2Message {
    /// Parse a single message from its complete bytes.
    pub fn parse(raw: Bytes, tables: &Grib2Tables) -> Grib2Result<Self> {
        let indicator = sections::parse_indicator(&raw)?;
        let identification = sections::parse_identification(&raw)?;
        let grid_definition = sections::parse_grid_definition(&raw)?;
        let product_definition =
            sections::parse_product_definition(&raw, indicator.discipline, tables)?;
        let data_representation = sections::parse_data_representation(&raw)?;
        let bitmap = sections::parse_bitmap(&raw)?;
        let data_section = sections::parse_data_section(&raw)?;

        Ok(Self {
            indicator,
            identification,
            grid_definition,
            product_definition,
            data_representation,
            bitmap,
            data_section,
            raw,
        })
    }

    /// Parameter short name, e.g. `TMP`.
    pub fn parameter(&self) -> &str {
        &self.product_definition.parameter_short_name
    }

    /// Human readable level, e.g. `500 mb`.
    pub fn level(&self) -> &str {
        &self.product_definition.level_description
    }

    /// Grid dimensions as `(rows, columns)`.
    pub fn grid_dims(&self) -> (usize, usize) {
        (
            self.grid_definition.num_points_latitude as usize,
            self.grid_definition.num_points_longitude as usize,
        )
    }

    /// Unpack the field values in scan order; missing points are NaN.
    pub fn unpack_data(&self) -> Grib2Result<Vec<f32>> {
        let repr = &self.data_representation;
        let values = match repr.template_number {
            0 => unpacking::unpack_simple(
                &self.data_section.data,
                repr.num_data_points,
                repr.bits_per_value,
                repr.reference_value,
                repr.binary_scale_factor,
                repr.decimal_scale_factor,
                self.bitmap.as_ref().map(|b| b.data.as_ref()),
                self.grid_definition.num_points(),
            )?,
            other => {
                debug!(template = other, "Delegating unpacking to grib crate");
                unpacking::unpack_with_grib_crate(&self.raw)?
            }
        };

        let expected = self.grid_definition.num_points();
        if values.len() != expected {
            return Err(Grib2Error::UnpackingError(format!(
                "Decoded {} values for a grid of {} points",
                values.len(),
                expected
            )));
        }
        Ok(values)
    }
}

/// Sequential reader over concatenated GRIB2 messages.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
    tables: Grib2Tables,
}

impl Grib2Reader {
    pub fn new(data: Bytes, tables: Grib2Tables) -> Self {
        Self {
            data,
            offset: 0,
            tables,
        }
    }

    /// Read the next message, or `None` at the end of the payload.
    pub fn next_message(&mut self) -> Grib2Result<Option<Grib2Message>> {
        // Skip anything that precedes the next "GRIB" marker
        let remaining = &self.data[self.offset..];
        let start = match remaining.windows(4).position(|w| w == b"GRIB") {
            Some(pos) => self.offset + pos,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        let indicator = sections::parse_indicator(&self.data[start..])?;
        let available = self.data.len() - start;
        let end = usize::try_from(indicator.message_length)
            .ok()
            .filter(|&length| length >= 20)
            .and_then(|length| start.checked_add(length))
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "Message at offset {} declares length {} but only {} bytes remain",
                    start, indicator.message_length, available
                ))
            })?;
        if &self.data[end - 4..end] != b"7777" {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message at offset {} is missing its end marker",
                start
            )));
        }

        self.offset = end;
        let raw = self.data.slice(start..end);
        Grib2Message::parse(raw, &self.tables).map(Some)
    }

    /// Read every remaining message.
    pub fn read_all(mut self) -> Grib2Result<Vec<Grib2Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }
        Ok(messages)
    }
}
