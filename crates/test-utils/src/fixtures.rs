//! Common test fixtures.
//!
//! A mid-latitude-ish GFS column on the 31-level ladder, a few real
//! stations, and canned `am` output streams.

use met_common::{CellBox, Station, LATLON_DELTA, PRESSURE_LEVELS_MBAR};

use crate::generators::{level, param, GfsPayloadBuilder};

/// Stations used across tests.
pub mod stations {
    use met_common::Station;

    /// Submillimeter Array, Maunakea (between the 650 and 600 mbar levels)
    pub fn sma() -> Station {
        Station::new("Sw", "SMA", 19.824, -155.478, 4080.0)
    }

    /// ALMA, Chajnantor
    pub fn alma() -> Station {
        Station::new("Aa", "ALMA", -23.029, -67.755, 5074.0)
    }

    /// Kitt Peak 12m
    pub fn kitt_peak() -> Station {
        Station::new("Kt", "KP", 31.956, -111.612, 1902.0)
    }
}

/// One value per ladder level, index 0 = 1 mbar.
#[derive(Debug, Clone)]
pub struct ColumnFixture {
    pub height: [f32; 31],
    pub temperature: [f32; 31],
    pub relative_humidity: [f32; 31],
    pub ozone_mass_ratio: [f32; 31],
    pub cloud_liquid: [f32; 31],
    pub cloud_ice: [f32; 31],
}

/// A plausible subtropical column with a liquid cloud near 700 mbar and
/// cirrus near 300 mbar.
pub fn standard_column() -> ColumnFixture {
    let mut cloud_liquid = [0.0; 31];
    cloud_liquid[level_index(650)] = 5e-5;
    cloud_liquid[level_index(700)] = 1e-4;
    let mut cloud_ice = [0.0; 31];
    cloud_ice[level_index(300)] = 2e-5;
    cloud_ice[level_index(350)] = 1e-5;

    ColumnFixture {
        height: [
            47800.0, 42600.0, 39400.0, 35800.0, 33400.0, 31000.0, 26500.0, 23850.0, 20600.0,
            18450.0, 16180.0, 13600.0, 11800.0, 10360.0, 9160.0, 8110.0, 7180.0, 6340.0,
            5570.0, 4860.0, 4200.0, 3580.0, 3010.0, 2470.0, 1950.0, 1460.0, 990.0, 760.0,
            540.0, 320.0, 110.0,
        ],
        temperature: [
            270.0, 262.0, 255.0, 247.0, 241.0, 236.0, 228.0, 224.0, 219.0, 216.0, 207.0,
            212.0, 218.0, 224.0, 231.0, 238.0, 245.0, 251.0, 257.0, 262.0, 266.0, 270.0,
            274.0, 278.0, 282.0, 286.0, 289.0, 291.0, 293.0, 295.0, 297.0,
        ],
        relative_humidity: [
            2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 5.0, 10.0, 20.0, 30.0, 40.0,
            45.0, 50.0, 50.0, 45.0, 40.0, 35.0, 30.0, 25.0, 30.0, 40.0, 60.0, 70.0, 75.0,
            80.0, 82.0, 85.0,
        ],
        ozone_mass_ratio: [
            4e-6, 6e-6, 8e-6, 1.1e-5, 1.2e-5, 1.2e-5, 9e-6, 7e-6, 4e-6, 2.5e-6, 1e-6, 4e-7,
            2e-7, 1e-7, 8e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8,
            6e-8, 6e-8, 6e-8, 6e-8, 6e-8, 6e-8,
        ],
        cloud_liquid,
        cloud_ice,
    }
}

/// Index of `mbar` on the pressure ladder.
pub fn level_index(mbar: u32) -> usize {
    PRESSURE_LEVELS_MBAR
        .iter()
        .position(|&p| p == mbar)
        .unwrap_or_else(|| panic!("{} mbar is not a ladder level", mbar))
}

/// Auxiliary surface values written by [`station_payload`].
#[derive(Debug, Clone, Copy)]
pub struct AuxiliaryFixture {
    pub csnow: f32,
    pub cicep: f32,
    pub cfrzr: f32,
    pub crain: f32,
    pub gust: f32,
    pub max_wind: (f32, f32),
    pub wind_10m: (f32, f32),
}

impl Default for AuxiliaryFixture {
    fn default() -> Self {
        Self {
            csnow: 0.0,
            cicep: 0.0,
            cfrzr: 0.0,
            crain: 1.0,
            gust: 7.5,
            max_wind: (30.0, 40.0),
            wind_10m: (3.0, 4.0),
        }
    }
}

/// Payload builder over the cell containing `station`, holding `column`
/// constant across the four corners.
pub fn column_payload(station: &Station, column: &ColumnFixture) -> GfsPayloadBuilder {
    let cell = CellBox::around(station.lat, station.lon, LATLON_DELTA);
    let mut payload = GfsPayloadBuilder::new(cell.bottom_lat, cell.left_lon);
    for (i, &mbar) in PRESSURE_LEVELS_MBAR.iter().enumerate() {
        payload = payload
            .isobaric(param::HGT, mbar, column.height[i])
            .isobaric(param::TMP, mbar, column.temperature[i])
            .isobaric(param::RH, mbar, column.relative_humidity[i])
            .isobaric(param::O3MR, mbar, column.ozone_mass_ratio[i])
            .isobaric(param::CLWMR, mbar, column.cloud_liquid[i])
            .isobaric(param::ICMR, mbar, column.cloud_ice[i]);
    }
    payload
}

/// Add the auxiliary surface, max-wind and 10 m fields to a payload.
pub fn with_auxiliary(payload: GfsPayloadBuilder, aux: &AuxiliaryFixture) -> GfsPayloadBuilder {
    payload
        .constant(param::CSNOW, level::SURFACE, 0, aux.csnow)
        .constant(param::CICEP, level::SURFACE, 0, aux.cicep)
        .constant(param::CFRZR, level::SURFACE, 0, aux.cfrzr)
        .constant(param::CRAIN, level::SURFACE, 0, aux.crain)
        .constant(param::GUST, level::SURFACE, 0, aux.gust)
        .constant(param::UGRD, level::MAX_WIND, 0, aux.max_wind.0)
        .constant(param::VGRD, level::MAX_WIND, 0, aux.max_wind.1)
        .constant(param::UGRD, level::ABOVE_GROUND, 10, aux.wind_10m.0)
        .constant(param::VGRD, level::ABOVE_GROUND, 10, aux.wind_10m.1)
}

/// Complete synthetic NOMADS reply for `station`.
pub fn station_payload(station: &Station) -> Vec<u8> {
    with_auxiliary(
        column_payload(station, &standard_column()),
        &AuxiliaryFixture::default(),
    )
    .build()
}

/// Canned `am` output streams.
pub mod am_output {
    /// stdout for `output f GHz tau Tb K`
    pub const STDOUT: &str = "225 7.6246e-02 2.3999e+01\n";

    /// stderr summary: 2 mm PWV, 0.1 kg/m^2 LWP, no ice, 250 DU ozone
    pub const STDERR: &str = "\
# am version 12.0 (build date Jan  1 2021 00:00:00)
#
# total
#   dry_air  1.2345e+25 cm^-2
#   h2o  6.6854e+21 cm^-2
#   lwp_abs_Rayleigh  3.3427e+20 cm^-2
#   o3  6.7170e+18 cm^-2
#
";

    /// The table row the streams above produce.
    pub const ROW_VALUES: &str =
        "  7.6246e-02   2.3999e+01   2.0000e+00   1.0000e-01   0.0000e+00   2.5000e+02";

    /// stderr with no water vapour column.
    pub const STDERR_WITHOUT_H2O: &str = "\
# am version 12.0 (build date Jan  1 2021 00:00:00)
#   dry_air  1.2345e+25 cm^-2
#   o3  6.7170e+18 cm^-2
";
}
