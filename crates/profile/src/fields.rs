//! Index of decoded 2-D fields over the station's grid cell.

use std::collections::HashMap;

use bytes::Bytes;
use grib2_parser::{Grib2Message, Grib2Reader, Grib2Tables};
use met_common::CellBox;
use tracing::{debug, warn};

use crate::error::ProfileResult;
use crate::interpolation::Corners;

/// Vertical level of a field, as used by the NOMADS filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelKey {
    /// Isobaric surface in mbar
    Isobaric(u32),
    Surface,
    MaxWind,
    /// Height above ground in meters
    AboveGround(u32),
    Other(u8),
}

impl LevelKey {
    fn from_message(message: &Grib2Message) -> Self {
        let product = &message.product_definition;
        match product.level_type {
            100 => LevelKey::Isobaric((product.level_value / 100.0).round() as u32),
            1 => LevelKey::Surface,
            6 => LevelKey::MaxWind,
            103 => LevelKey::AboveGround(product.level_value.round() as u32),
            other => LevelKey::Other(other),
        }
    }
}

/// Corner values for every (field, level) pair found in a payload.
#[derive(Debug, Default)]
pub struct FieldIndex {
    fields: HashMap<(String, LevelKey), Corners>,
}

impl FieldIndex {
    /// Decode `payload` and keep the four corners of `cell` from each message.
    ///
    /// Messages whose grid does not contain the cell are skipped; a payload
    /// that is not valid GRIB2 is an error.
    pub fn from_payload(
        payload: Bytes,
        tables: Grib2Tables,
        cell: &CellBox,
    ) -> ProfileResult<Self> {
        let mut reader = Grib2Reader::new(payload, tables);
        let mut index = FieldIndex::default();

        while let Some(message) = reader.next_message()? {
            let key = (message.parameter().to_string(), LevelKey::from_message(&message));
            if index.fields.contains_key(&key) {
                debug!(param = %key.0, level = message.level(), "Duplicate field, keeping first");
                continue;
            }
            match cell_corners(&message, cell)? {
                Some(corners) => {
                    index.fields.insert(key, corners);
                }
                None => warn!(
                    param = message.parameter(),
                    level = message.level(),
                    "Field grid does not contain the station cell, skipping"
                ),
            }
        }

        Ok(index)
    }

    pub fn get(&self, name: &str, level: LevelKey) -> Option<&Corners> {
        self.fields.get(&(name.to_string(), level))
    }

    pub fn insert(&mut self, name: &str, level: LevelKey, corners: Corners) {
        self.fields.insert((name.to_string(), level), corners);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Extract `a[i][j]` for the cell, `i` from the bottom and `j` from the left.
fn cell_corners(message: &Grib2Message, cell: &CellBox) -> ProfileResult<Option<Corners>> {
    let grid = &message.grid_definition;
    let (rows, cols) = message.grid_dims();
    let tolerance = cell.delta * 1e-3;

    let find_row = |lat: f64| (0..rows).find(|&r| (grid.latitude_at(r) - lat).abs() < tolerance);
    let find_col = |lon: f64| {
        let lon = lon.rem_euclid(360.0);
        (0..cols).find(|&c| {
            let d = (grid.longitude_at(c) - lon).abs();
            d < tolerance || (360.0 - d) < tolerance
        })
    };

    let (Some(bottom), Some(top), Some(left), Some(right)) = (
        find_row(cell.bottom_lat),
        find_row(cell.top_lat),
        find_col(cell.left_lon),
        find_col(cell.right_lon),
    ) else {
        return Ok(None);
    };

    let values = message.unpack_data()?;
    let at = |row: usize, col: usize| f64::from(values[grid.index(row, col)]);
    Ok(Some([
        [at(bottom, left), at(bottom, right)],
        [at(top, left), at(top, right)],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use met_common::LATLON_DELTA;
    use test_utils::{level, param, GfsPayloadBuilder, Grib2Builder};

    #[test]
    fn test_index_keys_by_name_and_level() {
        let cell = CellBox::around(19.824, -155.478, LATLON_DELTA);
        let payload = GfsPayloadBuilder::new(cell.bottom_lat, cell.left_lon)
            .field(param::TMP, level::ISOBARIC, 50_000, [[1.0, 2.0], [3.0, 4.0]])
            .constant(param::GUST, level::SURFACE, 0, 9.0)
            .constant(param::UGRD, level::ABOVE_GROUND, 10, 2.0)
            .build();

        let index =
            FieldIndex::from_payload(Bytes::from(payload), Grib2Tables::gfs(), &cell).unwrap();

        assert_eq!(index.len(), 3);
        let tmp = index.get("TMP", LevelKey::Isobaric(500)).unwrap();
        assert_eq!(tmp, &[[1.0, 2.0], [3.0, 4.0]]);
        assert!(index.get("GUST", LevelKey::Surface).is_some());
        assert!(index.get("UGRD", LevelKey::AboveGround(10)).is_some());
        assert!(index.get("TMP", LevelKey::Isobaric(600)).is_none());
    }

    #[test]
    fn test_south_to_north_scanning() {
        let cell = CellBox::around(-23.029, -67.755, LATLON_DELTA);
        let payload = Grib2Builder::new_gfs_cell(cell.bottom_lat, cell.left_lon)
            .with_scanning_mode(0x40)
            .with_level(100, 50_000)
            .with_corners([[1.0, 2.0], [3.0, 4.0]])
            .build();

        let index =
            FieldIndex::from_payload(Bytes::from(payload), Grib2Tables::gfs(), &cell).unwrap();
        let tmp = index.get("TMP", LevelKey::Isobaric(500)).unwrap();
        assert_eq!(tmp, &[[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_grid_elsewhere_is_skipped() {
        let cell = CellBox::around(19.824, -155.478, LATLON_DELTA);
        let payload = GfsPayloadBuilder::new(40.0, 10.0)
            .isobaric(param::TMP, 500, 250.0)
            .build();
        let index =
            FieldIndex::from_payload(Bytes::from(payload), Grib2Tables::gfs(), &cell).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_garbage_payload_is_an_error() {
        let cell = CellBox::around(19.824, -155.478, LATLON_DELTA);
        let mut payload = GfsPayloadBuilder::new(cell.bottom_lat, cell.left_lon)
            .isobaric(param::TMP, 500, 250.0)
            .build();
        payload.truncate(40);
        assert!(FieldIndex::from_payload(Bytes::from(payload), Grib2Tables::gfs(), &cell).is_err());
    }
}
