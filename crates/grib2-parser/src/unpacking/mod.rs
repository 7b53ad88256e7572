//! GRIB2 data unpacking.
//!
//! Simple packing (template 5.0) is decoded here. Complex packing, JPEG2000
//! and PNG payloads are handed to the `grib` crate decoder.

use std::io::Cursor;

use crate::sections::MAX_GRID_POINTS;
use crate::Grib2Error;

/// Unpack simple packed GRIB2 data into one value per grid point.
///
/// Simple packing formula: value = (R + X * 2^E) * 10^(-D).
/// `num_packed` values are stored in the data section; when a bitmap is
/// present they fill only the points whose bit is set, the others are NaN.
#[allow(clippy::too_many_arguments)]
pub fn unpack_simple(
    packed_data: &[u8],
    num_packed: u32,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
    num_points: usize,
) -> Result<Vec<f32>, Grib2Error> {
    if num_points > MAX_GRID_POINTS {
        return Err(Grib2Error::UnpackingError(format!(
            "Grid of {} points exceeds the {} point limit",
            num_points, MAX_GRID_POINTS
        )));
    }
    let packed_bits = (num_packed as usize).saturating_mul(bits_per_value as usize);
    if packed_bits > packed_data.len().saturating_mul(8) {
        return Err(Grib2Error::UnpackingError(format!(
            "{} values of {} bits need {} bytes, data section has {}",
            num_packed,
            bits_per_value,
            (packed_bits + 7) / 8,
            packed_data.len()
        )));
    }

    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));
    let reference = f64::from(reference_value);
    let bits_per_value = bits_per_value as usize;

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;
    let mut unpacked = 0u32;

    for i in 0..num_points {
        let has_value = match bitmap {
            Some(bm) => {
                let byte_idx = i / 8;
                let bit_idx = 7 - (i % 8);
                byte_idx < bm.len() && (bm[byte_idx] >> bit_idx) & 1 == 1
            }
            None => true,
        };

        if !has_value {
            values.push(f32::NAN);
            continue;
        }

        if unpacked >= num_packed {
            return Err(Grib2Error::UnpackingError(format!(
                "Grid has more present points than the {} packed values",
                num_packed
            )));
        }

        let packed_value = if bits_per_value == 0 {
            0
        } else {
            extract_bits(packed_data, bit_position, bits_per_value)
                .map_err(|e| Grib2Error::UnpackingError(format!("Failed to extract bits: {}", e)))?
        };
        bit_position += bits_per_value;
        unpacked += 1;

        let value = (reference + f64::from(packed_value) * binary_scale) * decimal_scale;
        values.push(value as f32);
    }

    Ok(values)
}

/// Decode a complete message with the `grib` crate.
pub fn unpack_with_grib_crate(message: &[u8]) -> Result<Vec<f32>, Grib2Error> {
    let grib_file = grib::from_reader(Cursor::new(message.to_vec()))
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate parse failed: {}", e)))?;

    let (_, submessage) = grib_file
        .iter()
        .next()
        .ok_or_else(|| Grib2Error::UnpackingError("grib crate found no submessage".to_string()))?;

    let decoder = grib::Grib2SubmessageDecoder::from(submessage)
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate decoder: {}", e)))?;
    let values = decoder
        .dispatch()
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate decode failed: {}", e)))?;

    Ok(values.collect())
}

/// Extract bits from a byte array, most significant bit first.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8);

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        let data = vec![0b10110101];

        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);
        assert!(extract_bits(&data, 4, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        let packed = vec![100, 200];
        let values = unpack_simple(&packed, 2, 8, 0.0, 0, 0, None, 2).unwrap();
        assert_eq!(values, vec![100.0, 200.0]);
    }

    #[test]
    fn test_scale_factors() {
        // R = 250, E = -1, D = 1: (250 + X/2) / 10
        let packed = vec![0, 20];
        let values = unpack_simple(&packed, 2, 8, 250.0, -1, 1, None, 2).unwrap();
        assert!((values[0] - 25.0).abs() < 1e-5);
        assert!((values[1] - 26.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_field() {
        let values = unpack_simple(&[], 4, 0, 273.15, 0, 0, None, 4).unwrap();
        assert_eq!(values, vec![273.15; 4]);
    }

    #[test]
    fn test_bitmap_marks_missing_points() {
        // Points 0 and 2 present, 1 and 3 missing
        let bitmap = [0b1010_0000];
        let packed = vec![7, 9];
        let values = unpack_simple(&packed, 2, 8, 0.0, 0, 0, Some(&bitmap), 4).unwrap();
        assert_eq!(values[0], 7.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 9.0);
        assert!(values[3].is_nan());
    }

    #[test]
    fn test_short_data_section_is_an_error() {
        // Four 16-bit values need 8 bytes
        let packed = vec![0u8; 5];
        let err = unpack_simple(&packed, 4, 16, 0.0, 0, 0, None, 4).unwrap_err();
        assert!(matches!(err, Grib2Error::UnpackingError(_)));
    }

    #[test]
    fn test_oversized_grid_is_rejected_before_allocating() {
        let err = unpack_simple(&[], u32::MAX, 0, 0.0, 0, 0, None, usize::MAX).unwrap_err();
        assert!(matches!(err, Grib2Error::UnpackingError(_)));
    }
}
