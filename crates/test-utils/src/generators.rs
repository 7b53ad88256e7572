//! Synthetic GRIB2 data for tests.
//!
//! [`Grib2Builder`] writes a single valid GRIB2 message (template 3.0 grid,
//! template 4.0 product, simple packing). [`GfsPayloadBuilder`] concatenates
//! messages over one 0.25 degree cell the way the NOMADS filter returns them.

/// GRIB2 sign-magnitude encoding of a 32-bit value.
pub fn encode_signed_u32(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

/// GRIB2 sign-magnitude encoding of a 16-bit value.
pub fn encode_signed_u16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition, microdegrees
    ni: u32,
    nj: u32,
    la1: i32,
    lo1: i32,
    la2: i32,
    lo2: i32,
    di: u32,
    dj: u32,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    // Packing
    bits_per_value: u8,
    decimal_scale_factor: i16,
    data_values: Vec<f32>,
}

impl Grib2Builder {
    /// A 2x2 GFS-like grid whose south-west corner is at the given point.
    ///
    /// Rows run north to south (scanning mode 0) and longitudes are written
    /// in the 0..360 convention NOMADS uses.
    pub fn new_gfs_cell(bottom_lat: f64, left_lon: f64) -> Self {
        let delta = 250_000;
        let bottom = (bottom_lat * 1e6).round() as i32;
        let left = (left_lon.rem_euclid(360.0) * 1e6).round() as i32;
        Self {
            discipline: 0,
            center: 7, // NCEP
            year: 2020,
            month: 3,
            day: 16,
            hour: 18,
            ni: 2,
            nj: 2,
            la1: bottom + delta,
            lo1: left,
            la2: bottom,
            lo2: left + delta,
            di: delta as u32,
            dj: delta as u32,
            scanning_mode: 0,
            param_category: 0,
            param_number: 0, // TMP
            level_type: 100,
            level_value: 50_000,
            forecast_hour: 0,
            bits_per_value: 24,
            decimal_scale_factor: 0,
            data_values: vec![273.15; 4],
        }
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    /// Set the scanning mode, reordering the first/last latitude so rows
    /// still cover the same cell.
    pub fn with_scanning_mode(mut self, scanning_mode: u8) -> Self {
        let south_to_north = scanning_mode & 0x40 != 0;
        if south_to_north != (self.la1 < self.la2) {
            std::mem::swap(&mut self.la1, &mut self.la2);
        }
        self.scanning_mode = scanning_mode;
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale_factor: i16) -> Self {
        self.decimal_scale_factor = decimal_scale_factor;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    /// Values in scan order.
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Corner values as `a[i][j]`, `i` the latitude index from the south,
    /// `j` the longitude index from the west.
    pub fn with_corners(self, a: [[f32; 2]; 2]) -> Self {
        let data = if self.scanning_mode & 0x40 != 0 {
            vec![a[0][0], a[0][1], a[1][0], a[1][1]]
        } else {
            vec![a[1][0], a[1][1], a[0][0], a[0][1]]
        };
        self.with_data(data)
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        for section in &sections {
            message.extend_from_slice(section);
        }
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Start of forecast

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0);
        section.push(0);

        section.push(0); // Operational
        section.push(1); // Forecast

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let section_length: u32 = 14 + 58;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(3);

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Spherical earth, radius 6371229 m
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&encode_signed_u32(self.la1));
        section.extend_from_slice(&encode_signed_u32(self.lo1));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&encode_signed_u32(self.la2));
        section.extend_from_slice(&encode_signed_u32(self.lo2));
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4);

        section.extend_from_slice(&0u16.to_be_bytes()); // Coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Forecast
        section.push(0);
        section.push(96); // GFS generating process
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(0);
        section.push(1); // Hours
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());

        section.push(self.level_type);
        section.push(0); // Scale factor
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // No second fixed surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    /// Packing parameters `(reference, binary scale, bits)` for the data.
    fn packing(&self) -> (f32, i16, u8) {
        let decimal = 10f64.powi(i32::from(self.decimal_scale_factor));
        let scaled: Vec<f64> = self
            .data_values
            .iter()
            .map(|&v| f64::from(v) * decimal)
            .collect();
        let min = scaled.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scaled.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range == 0.0 {
            return (min as f32, 0, 0);
        }
        let max_packed = ((1u64 << self.bits_per_value) - 1) as f64;
        let binary_scale = (range / max_packed).log2().ceil() as i16;
        (min as f32, binary_scale, self.bits_per_value)
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing();

        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);

        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0

        section.extend_from_slice(&reference_value.to_be_bytes());
        section.extend_from_slice(&encode_signed_u16(binary_scale_factor));
        section.extend_from_slice(&encode_signed_u16(self.decimal_scale_factor));
        section.push(bits_per_value);
        section.push(0); // Floating point

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&6u32.to_be_bytes());
        section.push(6);
        section.push(255); // No bitmap
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let packed = self.pack_simple();
        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed);
        section
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing();
        if bits_per_value == 0 {
            return Vec::new();
        }

        let decimal = 10f64.powi(i32::from(self.decimal_scale_factor));
        let binary_scale = 2f64.powi(i32::from(binary_scale_factor));
        let max_packed = (1u64 << bits_per_value) - 1;

        let mut writer = BitWriter::default();
        for &value in &self.data_values {
            let packed = ((f64::from(value) * decimal - f64::from(reference_value)) / binary_scale)
                .round()
                .clamp(0.0, max_packed as f64) as u64;
            writer.write(packed, bits_per_value as usize);
        }
        writer.finish()
    }
}

#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: usize,
}

impl BitWriter {
    fn write(&mut self, value: u64, bits: usize) {
        for shift in (0..bits).rev() {
            let bit = ((value >> shift) & 1) as u8;
            self.current = (self.current << 1) | bit;
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current << (8 - self.filled));
        }
        self.bytes
    }
}

/// GRIB2 level type codes used by the GFS subset.
pub mod level {
    pub const SURFACE: u8 = 1;
    pub const MAX_WIND: u8 = 6;
    pub const ISOBARIC: u8 = 100;
    pub const ABOVE_GROUND: u8 = 103;
}

/// GFS parameter codes `(category, number)`, discipline 0.
pub mod param {
    pub const TMP: (u8, u8) = (0, 0);
    pub const RH: (u8, u8) = (1, 1);
    pub const CLWMR: (u8, u8) = (1, 22);
    pub const ICMR: (u8, u8) = (1, 23);
    pub const CRAIN: (u8, u8) = (1, 192);
    pub const CFRZR: (u8, u8) = (1, 193);
    pub const CICEP: (u8, u8) = (1, 194);
    pub const CSNOW: (u8, u8) = (1, 195);
    pub const UGRD: (u8, u8) = (2, 2);
    pub const VGRD: (u8, u8) = (2, 3);
    pub const GUST: (u8, u8) = (2, 22);
    pub const HGT: (u8, u8) = (3, 5);
    pub const O3MR: (u8, u8) = (14, 192);
}

/// Concatenated GFS messages over the cell surrounding a station.
#[derive(Debug, Clone)]
pub struct GfsPayloadBuilder {
    template: Grib2Builder,
    messages: Vec<Vec<u8>>,
}

impl GfsPayloadBuilder {
    pub fn new(bottom_lat: f64, left_lon: f64) -> Self {
        Self {
            template: Grib2Builder::new_gfs_cell(bottom_lat, left_lon),
            messages: Vec::new(),
        }
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.template = self.template.with_forecast_hour(hour);
        self
    }

    /// Add a field with explicit corner values `a[i][j]`.
    pub fn field(
        mut self,
        parameter: (u8, u8),
        level_type: u8,
        level_value: u32,
        corners: [[f32; 2]; 2],
    ) -> Self {
        let message = self
            .template
            .clone()
            .with_parameter(parameter.0, parameter.1)
            .with_level(level_type, level_value)
            .with_corners(corners)
            .build();
        self.messages.push(message);
        self
    }

    /// Add a field that is constant over the cell.
    pub fn constant(
        self,
        parameter: (u8, u8),
        level_type: u8,
        level_value: u32,
        value: f32,
    ) -> Self {
        self.field(parameter, level_type, level_value, [[value; 2]; 2])
    }

    /// Add a constant isobaric field at `mbar`.
    pub fn isobaric(self, parameter: (u8, u8), mbar: u32, value: f32) -> Self {
        self.constant(parameter, level::ISOBARIC, mbar * 100, value)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn build(&self) -> Vec<u8> {
        self.messages.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_gfs_message() {
        let data = Grib2Builder::new_gfs_cell(19.75, -155.5).build();

        assert_eq!(&data[0..4], b"GRIB");
        assert_eq!(data[7], 2);
        assert_eq!(data[6], 0);
        assert_eq!(&data[data.len() - 4..], b"7777");

        let declared = u64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(declared as usize, data.len());
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(encode_signed_u32(5), [0, 0, 0, 5]);
        assert_eq!(encode_signed_u32(-5), [0x80, 0, 0, 5]);
        assert_eq!(encode_signed_u16(-3), [0x80, 3]);
    }

    #[test]
    fn test_bit_writer_packs_msb_first() {
        let mut writer = BitWriter::default();
        writer.write(0b101, 3);
        writer.write(0b1, 1);
        assert_eq!(writer.finish(), vec![0b1011_0000]);
    }

    #[test]
    fn test_payload_concatenates_messages() {
        let payload = GfsPayloadBuilder::new(19.75, -155.5)
            .isobaric(param::TMP, 500, 260.0)
            .isobaric(param::HGT, 500, 5600.0);
        assert_eq!(payload.message_count(), 2);
        let bytes = payload.build();
        assert_eq!(&bytes[0..4], b"GRIB");
        assert_eq!(&bytes[bytes.len() - 4..], b"7777");
    }
}
