//! GRIB2 section parsing.
//!
//! Each GRIB2 message consists of multiple sections containing metadata,
//! grid information and packed data. Sections are located by walking the
//! section length prefixes after the 16-byte indicator.

use crate::tables::Grib2Tables;
use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Largest grid accepted from Section 3: the global 0.25 degree GFS grid.
pub const MAX_GRID_POINTS: usize = 1440 * 721;

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section (template 3.0, regular lat/lon)
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template_number: u16,
    pub num_points_latitude: u32,
    pub num_points_longitude: u32,
    pub first_latitude_microdegrees: i32,
    pub first_longitude_microdegrees: i32,
    pub last_latitude_microdegrees: i32,
    pub last_longitude_microdegrees: i32,
    pub longitude_increment_microdegrees: u32,
    pub latitude_increment_microdegrees: u32,
    pub scanning_mode: u8,
}

impl GridDefinition {
    pub fn num_points(&self) -> usize {
        (self.num_points_latitude as usize).saturating_mul(self.num_points_longitude as usize)
    }

    /// Latitude of grid row `row` in degrees.
    pub fn latitude_at(&self, row: usize) -> f64 {
        let first = f64::from(self.first_latitude_microdegrees) * 1e-6;
        let step = f64::from(self.latitude_increment_microdegrees) * 1e-6;
        // Bit 2 of the scanning mode set means rows run south to north
        if self.scanning_mode & 0x40 != 0 {
            first + step * row as f64
        } else {
            first - step * row as f64
        }
    }

    /// Longitude of grid column `col` in degrees, normalized to [0, 360).
    pub fn longitude_at(&self, col: usize) -> f64 {
        let first = f64::from(self.first_longitude_microdegrees) * 1e-6;
        let step = f64::from(self.longitude_increment_microdegrees) * 1e-6;
        let lon = if self.scanning_mode & 0x80 != 0 {
            first - step * col as f64
        } else {
            first + step * col as f64
        };
        lon.rem_euclid(360.0)
    }

    /// Index of `(row, col)` in the unpacked value array.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.num_points_longitude as usize + col
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub level_type: u8,
    /// First fixed surface value with its scale factor applied (Pa for isobaric levels)
    pub level_value: f64,
    pub level_description: String,
    pub forecast_hour: u32,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template_number: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 1-4: "GRIB", 5-6: reserved, 7: discipline, 8: edition,
    // 9-16: total length of the message (8-byte big-endian)
    let discipline = data[6];
    let edition = data[7];
    let mut length = [0u8; 8];
    length.copy_from_slice(&data[8..16]);
    let message_length = u64::from_be_bytes(length);

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let section_offset = find_section(data, 1)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte)
    let sec_data = &section_data[5..];

    let center = u16::from_be_bytes([sec_data[0], sec_data[1]]);
    let sub_center = u16::from_be_bytes([sec_data[2], sec_data[3]]);
    let table_version = sec_data[4];
    let local_table_version = sec_data[5];
    let significance_of_reference_time = sec_data[6];

    let year = u16::from_be_bytes([sec_data[7], sec_data[8]]);
    let month = sec_data[9];
    let day = sec_data[10];
    let hour = sec_data[11];
    let minute = sec_data[12];
    let second = sec_data[13];

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    let reference_time = DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc);

    let production_status = sec_data.get(14).copied().unwrap_or(0);
    let data_type = sec_data.get(15).copied().unwrap_or(0);

    Ok(Identification {
        center,
        sub_center,
        table_version,
        local_table_version,
        significance_of_reference_time,
        reference_time,
        production_status,
        data_type,
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section_offset = find_section(data, 3)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 0-3: section length, 4: section number, 5: source of grid
    // definition, 6-9: number of data points, 10-11: optional list,
    // 12-13: grid definition template number, 14+: template data
    let template_number = u16::from_be_bytes([section_data[12], section_data[13]]);
    if template_number != 0 {
        return Err(Grib2Error::UnsupportedGrid(format!(
            "grid definition template 3.{}",
            template_number
        )));
    }

    let gd = &section_data[14..];
    if gd.len() < 58 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
        });
    }

    // Template 3.0:
    // 16-19 Ni, 20-23 Nj, 32-35 La1, 36-39 Lo1, 40 resolution flags,
    // 41-44 La2, 45-48 Lo2, 49-52 Di, 53-56 Dj, 57 scanning mode.
    // Coordinates are microdegrees in sign-magnitude form.
    let ni = read_u32(&gd[16..20]);
    let nj = read_u32(&gd[20..24]);
    let la1 = decode_grib2_signed(&gd[32..36]);
    let lo1 = decode_grib2_signed(&gd[36..40]);
    let la2 = decode_grib2_signed(&gd[41..45]);
    let lo2 = decode_grib2_signed(&gd[45..49]);
    let di = read_u32(&gd[49..53]);
    let dj = read_u32(&gd[53..57]);
    let scanning_mode = gd[57];

    let points = u64::from(ni) * u64::from(nj);
    if points == 0 || points > MAX_GRID_POINTS as u64 {
        return Err(Grib2Error::UnsupportedGrid(format!(
            "{} x {} grid ({} points, at most {} supported)",
            ni, nj, points, MAX_GRID_POINTS
        )));
    }

    if scanning_mode & 0x20 != 0 {
        return Err(Grib2Error::UnsupportedGrid(format!(
            "column-major scanning mode {:#010b}",
            scanning_mode
        )));
    }

    Ok(GridDefinition {
        template_number,
        num_points_longitude: ni,
        num_points_latitude: nj,
        first_latitude_microdegrees: la1,
        first_longitude_microdegrees: lo1,
        last_latitude_microdegrees: la2,
        last_longitude_microdegrees: lo2,
        longitude_increment_microdegrees: di,
        latitude_increment_microdegrees: dj,
        scanning_mode,
    })
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(
    data: &[u8],
    discipline: u8,
    tables: &Grib2Tables,
) -> Result<ProductDefinition, Grib2Error> {
    let section_offset = find_section(data, 4)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 28 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 0-3: section length, 4: section number, 5-6: coordinate values,
    // 7-8: template number, 9: parameter category, 10: parameter number.
    // Templates 4.0 and 4.8 share the layout up to the first fixed surface:
    // 18-21 forecast time, 22 surface type, 23 scale factor, 24-27 scaled value.
    let template_number = u16::from_be_bytes([section_data[7], section_data[8]]);
    let parameter_category = section_data[9];
    let parameter_number = section_data[10];
    let forecast_hour = read_u32(&section_data[18..22]);

    let level_type = section_data[22];
    let scale_factor = decode_grib2_signed(&section_data[23..24]);
    let scaled_value = read_u32(&section_data[24..28]);
    let level_value = if scaled_value == u32::MAX {
        // All ones means "missing"
        0.0
    } else {
        f64::from(scaled_value) / 10f64.powi(scale_factor)
    };

    let parameter_short_name =
        tables.get_parameter_name(discipline, parameter_category, parameter_number);
    let level_description = tables.get_level_description(level_type, level_value);

    Ok(ProductDefinition {
        template_number,
        parameter_category,
        parameter_number,
        parameter_short_name,
        level_type,
        level_value,
        level_description,
        forecast_hour,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section_offset = find_section(data, 5)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9 [5-8]: number of packed values
    // Octets 10-11 [9-10]: data representation template number
    // Templates 5.0, 5.2, 5.3, 5.40 and 5.41 share:
    //   [11-14] reference value (IEEE float)
    //   [15-16] binary scale factor (sign-magnitude)
    //   [17-18] decimal scale factor (sign-magnitude)
    //   [19]    bits per packed value
    //   [20]    type of original field values
    let num_data_points = read_u32(&section_data[5..9]);
    let template_number = u16::from_be_bytes([section_data[9], section_data[10]]);
    let reference_value = f32::from_be_bytes([
        section_data[11],
        section_data[12],
        section_data[13],
        section_data[14],
    ]);
    let binary_scale_factor = decode_grib2_signed(&section_data[15..17]) as i16;
    let decimal_scale_factor = decode_grib2_signed(&section_data[17..19]) as i16;
    let bits_per_value = section_data[19];
    let original_data_type = section_data[20];

    Ok(DataRepresentation {
        num_data_points,
        template_number,
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value,
        original_data_type,
    })
}

/// Parse Section 6 (Bitmap). Returns `None` when no bitmap applies.
pub fn parse_bitmap(data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let section_offset = match find_section(data, 6) {
        Ok(offset) => offset,
        Err(_) => return Ok(None),
    };
    let section_data = &data[section_offset..];

    if section_data.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    let section_length = read_u32(&section_data[0..4]) as usize;
    let indicator = section_data[5];

    match indicator {
        255 => Ok(None),
        0 => {
            let bits = section_data
                .get(6..section_length)
                .ok_or_else(|| Grib2Error::InvalidSection {
                    section: 6,
                    reason: format!(
                        "Section length {} leaves no room for a bitmap",
                        section_length
                    ),
                })?;
            Ok(Some(Bitmap {
                indicator,
                data: Bytes::copy_from_slice(bits),
            }))
        }
        other => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Unsupported bitmap indicator {}", other),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let section_offset = find_section(data, 7)?;
    let section_data = &data[section_offset..];

    let section_length = read_u32(&section_data[0..4]) as usize;

    let data_bytes = if section_length > 5 {
        Bytes::copy_from_slice(&section_data[5..section_length])
    } else {
        Bytes::new()
    };

    Ok(DataSection { data: data_bytes })
}

// ===== Helper Functions =====

/// Decode a GRIB2 sign-magnitude integer (most significant bit is the sign).
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    let mut magnitude: u32 = 0;
    for &b in bytes {
        magnitude = (magnitude << 8) | u32::from(b);
    }
    let sign_bit = 1u32 << (bytes.len() * 8 - 1);
    if magnitude & sign_bit != 0 {
        -((magnitude & !sign_bit) as i32)
    } else {
        magnitude as i32
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 5 > data.len() || &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        let section_length = read_u32(&data[offset..offset + 4]) as usize;

        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}
