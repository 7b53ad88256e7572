//! Conversion of a station profile into `am` model layers.
//!
//! Layers run from the top of the pressure ladder down to the station. Each
//! layer takes its base from one ladder level and its column quantities from
//! the midpoint between that level and the one above it. When the station
//! does not sit exactly on a ladder level, a final partial layer is
//! interpolated down to the station altitude.

use std::fmt::{self, Write};

use met_common::{format_sci, ForecastHour, Station};

use crate::constants::{G_STD, H2O_SUPERCOOL_LIMIT, PASCAL_ON_MBAR, RH_TOP_PLEVEL, STRAT_H2O_VMR};
use crate::error::{ProfileError, ProfileResult};
use crate::profile::AtmosphericProfile;

/// Water vapour directive for one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Humidity {
    /// Relative humidity over liquid water, percent
    Relative(f64),
    /// Relative humidity over ice, percent
    RelativeIce(f64),
    /// Fixed volume mixing ratio above the RH top level
    Vmr(f64),
}

impl Humidity {
    pub fn value(&self) -> f64 {
        match *self {
            Humidity::Relative(x) | Humidity::RelativeIce(x) | Humidity::Vmr(x) => x,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtmosphericLayer {
    /// mbar
    pub base_pressure: f64,
    /// m
    pub base_height: f64,
    /// K
    pub base_temperature: f64,
    pub mid_temperature: f64,
    pub o3_vmr: f64,
    pub humidity: Humidity,
    /// kg m^-2
    pub liquid_column: f64,
    /// kg m^-2
    pub ice_column: f64,
}

/// Midpoint values of a layer before classification.
struct Midpoint {
    temperature: f64,
    o3_vmr: f64,
    relative_humidity: f64,
    cloud_lmr: f64,
    cloud_imr: f64,
}

impl AtmosphericLayer {
    fn classify(
        base_pressure: f64,
        base_height: f64,
        base_temperature: f64,
        dp_mbar: f64,
        mid: Midpoint,
    ) -> Self {
        let humidity = if base_pressure > RH_TOP_PLEVEL {
            if mid.temperature < H2O_SUPERCOOL_LIMIT {
                Humidity::RelativeIce(mid.relative_humidity)
            } else {
                Humidity::Relative(mid.relative_humidity)
            }
        } else {
            Humidity::Vmr(STRAT_H2O_VMR)
        };

        let mass = dp_mbar * PASCAL_ON_MBAR / G_STD;
        let mut liquid_column = mass * mid.cloud_lmr;
        let mut ice_column = mass * mid.cloud_imr;
        // Supercooled liquid is reported as ice
        if mid.temperature < H2O_SUPERCOOL_LIMIT {
            ice_column += liquid_column;
            liquid_column = 0.0;
        }

        Self {
            base_pressure,
            base_height,
            base_temperature,
            mid_temperature: mid.temperature,
            o3_vmr: mid.o3_vmr,
            humidity,
            liquid_column,
            ice_column,
        }
    }
}

impl fmt::Display for AtmosphericLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "layer")?;
        writeln!(
            f,
            "Pbase {:.1} mbar  # {:.1} m",
            self.base_pressure, self.base_height
        )?;
        writeln!(f, "Tbase {:.1} K", self.base_temperature)?;
        writeln!(f, "column dry_air vmr")?;
        if self.o3_vmr > 0.0 {
            writeln!(f, "column o3 vmr {}", format_sci(self.o3_vmr, 3))?;
        }
        match self.humidity {
            Humidity::Relative(rh) if rh > 0.0 => writeln!(f, "column h2o RH {:.2}%", rh)?,
            Humidity::RelativeIce(rh) if rh > 0.0 => writeln!(f, "column h2o RHi {:.2}%", rh)?,
            Humidity::Vmr(vmr) => writeln!(f, "column h2o vmr {}", format_sci(vmr, 3))?,
            _ => {}
        }
        if self.liquid_column > 0.0 {
            writeln!(
                f,
                "column lwp_abs_Rayleigh {} kg*m^-2",
                format_sci(self.liquid_column, 3)
            )?;
        }
        if self.ice_column > 0.0 {
            writeln!(
                f,
                "column iwp_abs_Rayleigh {} kg*m^-2",
                format_sci(self.ice_column, 3)
            )?;
        }
        writeln!(f)
    }
}

/// Build the layers from the top of `profile` down to `altitude` meters.
pub fn build_layers(
    profile: &AtmosphericProfile,
    altitude: f64,
) -> ProfileResult<Vec<AtmosphericLayer>> {
    profile.validate()?;
    if !altitude.is_finite() {
        return Err(ProfileError::InconsistentProfile(format!(
            "station altitude {} is not finite",
            altitude
        )));
    }
    if altitude > profile.height[0] {
        return Err(ProfileError::StationAboveProfile {
            altitude,
            top: profile.height[0],
        });
    }

    let z = &profile.height;
    let n = profile.len();

    let mut layers = Vec::with_capacity(n + 1);
    let mut last = 0;
    for i in 0..n {
        if z[i] < altitude {
            break;
        }
        layers.push(level_layer(profile, i));
        last = i;
    }

    if z[last] == altitude {
        return Ok(layers);
    }

    // Interpolate between the last level above the station and the first one
    // below it, or extrapolate from the bottom two levels.
    let (upper, lower) = if last + 1 < n { (last, last + 1) } else { (n - 2, n - 1) };
    layers.push(partial_layer(profile, altitude, last, upper, lower));

    Ok(layers)
}

fn level_layer(profile: &AtmosphericProfile, i: usize) -> AtmosphericLayer {
    let above = if i == 0 { 0 } else { i - 1 };
    let mid = |x: &[f64]| 0.5 * (x[above] + x[i]);
    let dp = if i == 0 {
        profile.pressure[0]
    } else {
        profile.pressure[i] - profile.pressure[i - 1]
    };

    AtmosphericLayer::classify(
        profile.pressure[i],
        profile.height[i],
        profile.temperature[i],
        dp,
        Midpoint {
            temperature: mid(&profile.temperature[..]),
            o3_vmr: mid(&profile.o3_vmr[..]),
            relative_humidity: mid(&profile.relative_humidity[..]),
            cloud_lmr: mid(&profile.cloud_lmr[..]),
            cloud_imr: mid(&profile.cloud_imr[..]),
        },
    )
}

/// Layer from ladder level `last` down to the station altitude.
fn partial_layer(
    profile: &AtmosphericProfile,
    altitude: f64,
    last: usize,
    upper: usize,
    lower: usize,
) -> AtmosphericLayer {
    let p = &profile.pressure;
    let z = &profile.height;
    let t = &profile.temperature;

    // Pressure is log-linear and temperature linear in height
    let u = (altitude - z[upper]) / (z[lower] - z[upper]);
    let p_s = (u * p[lower].ln() + (1.0 - u) * p[upper].ln()).exp();
    let t_s = u * t[lower] + (1.0 - u) * t[upper];

    // Everything else is linear in pressure, clamped at zero
    let w = (p_s - p[upper]) / (p[lower] - p[upper]);
    let at_station = |x: &[f64]| (w * x[lower] + (1.0 - w) * x[upper]).max(0.0);
    let mid = |x: &[f64]| 0.5 * (x[last] + at_station(x));

    AtmosphericLayer::classify(
        p_s,
        altitude,
        t_s,
        p_s - p[last],
        Midpoint {
            temperature: 0.5 * (t[last] + t_s),
            o3_vmr: mid(&profile.o3_vmr[..]),
            relative_humidity: mid(&profile.relative_humidity[..]),
            cloud_lmr: mid(&profile.cloud_lmr[..]),
            cloud_imr: mid(&profile.cloud_imr[..]),
        },
    )
}

/// Provenance comment block placed ahead of the layers.
#[derive(Debug, Clone)]
pub struct LayerPreamble {
    pub production_day: String,
    pub cycle_hour: u32,
    pub offset: u32,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl LayerPreamble {
    pub fn new(hour: &ForecastHour, station: &Station) -> Self {
        Self {
            production_day: hour.cycle.day(),
            cycle_hour: hour.cycle.hour(),
            offset: hour.offset,
            lat: station.lat,
            lon: station.lon,
            alt: station.alt,
        }
    }
}

impl fmt::Display for LayerPreamble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "#")?;
        writeln!(f, "# Layers derived from NCEP GFS 0.25 degree forecast data")?;
        writeln!(f, "# retrieved from NOMADS (https://nomads.ncep.noaa.gov).")?;
        writeln!(f, "#")?;
        writeln!(f, "#         Production date: {}", self.production_day)?;
        writeln!(f, "#                   Cycle: {:02} UT", self.cycle_hour)?;
        writeln!(f, "#                 Product: {:03} hour forecast", self.offset)?;
        writeln!(f, "#")?;
        writeln!(f, "# Interpolated to")?;
        writeln!(f, "#")?;
        writeln!(f, "#                latitude: {} deg. N", self.lat)?;
        writeln!(f, "#               longitude: {} deg. E", self.lon)?;
        writeln!(f, "#   Geopotential altitude: {} m", self.alt)?;
        writeln!(f, "#")?;
        writeln!(f)
    }
}

/// Render the preamble and layers as `am` configuration text.
pub fn render_layers(preamble: &LayerPreamble, layers: &[AtmosphericLayer]) -> String {
    let mut text = preamble.to_string();
    for layer in layers {
        // Writing to a String cannot fail
        let _ = write!(text, "{}", layer);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use met_common::ForecastCycle;
    use test_utils::{assert_approx_eq, assert_rel_eq};

    /// Three levels at 100, 200 and 400 mbar.
    fn ladder() -> AtmosphericProfile {
        AtmosphericProfile {
            pressure: vec![100.0, 200.0, 400.0],
            height: vec![16000.0, 12000.0, 7000.0],
            temperature: vec![210.0, 220.0, 250.0],
            o3_vmr: vec![2e-6, 1e-6, 1e-7],
            relative_humidity: vec![10.0, 20.0, 60.0],
            cloud_lmr: vec![0.0, 0.0, 1e-4],
            cloud_imr: vec![0.0, 2e-5, 0.0],
        }
    }

    #[test]
    fn test_station_on_a_level_has_no_partial_layer() {
        let layers = build_layers(&ladder(), 12000.0).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1].base_pressure, 200.0);
    }

    #[test]
    fn test_top_layer_uses_own_values() {
        let layers = build_layers(&ladder(), 12000.0).unwrap();
        let top = &layers[0];
        assert_eq!(top.mid_temperature, 210.0);
        assert_eq!(top.o3_vmr, 2e-6);
        assert_eq!(top.humidity, Humidity::RelativeIce(10.0));
    }

    #[test]
    fn test_midpoints_and_cloud_columns() {
        let layers = build_layers(&ladder(), 7000.0).unwrap();
        assert_eq!(layers.len(), 3);

        let second = &layers[1];
        assert_eq!(second.mid_temperature, 215.0);
        assert_approx_eq!(second.o3_vmr, 1.5e-6, 1e-18);
        // 100 mbar of air, 1e-5 kg/kg ice midpoint
        assert_rel_eq!(second.ice_column, 100.0 * 100.0 / 9.80665 * 1e-5, 1e-12);

        // 235 K midpoint: the liquid is reclassified as ice
        let third = &layers[2];
        assert_eq!(third.mid_temperature, 235.0);
        assert_eq!(third.liquid_column, 0.0);
        let expected = 200.0 * 100.0 / 9.80665 * (0.5e-4 + 1e-5);
        assert_rel_eq!(third.ice_column, expected, 1e-12);
    }

    #[test]
    fn test_partial_layer_interpolation() {
        let layers = build_layers(&ladder(), 9500.0).unwrap();
        assert_eq!(layers.len(), 3);

        let partial = &layers[2];
        // Halfway in height between 200 and 400 mbar
        let p_s = (0.5 * 400f64.ln() + 0.5 * 200f64.ln()).exp();
        assert_approx_eq!(partial.base_pressure, p_s, 1e-9);
        assert_approx_eq!(partial.base_temperature, 235.0, 1e-9);
        assert_eq!(partial.base_height, 9500.0);
        assert_approx_eq!(partial.mid_temperature, 227.5, 1e-9);

        let w = (p_s - 200.0) / 200.0;
        let rh_s = w * 60.0 + (1.0 - w) * 20.0;
        assert_approx_eq!(
            partial.humidity.value(),
            0.5 * (20.0 + rh_s),
            1e-9
        );
    }

    #[test]
    fn test_station_below_lowest_level_extrapolates() {
        let layers = build_layers(&ladder(), 6000.0).unwrap();
        assert_eq!(layers.len(), 4);
        let partial = &layers[3];
        assert!(partial.base_pressure > 400.0);
        // u = 1.2: temperature extrapolates past the bottom level
        assert_approx_eq!(partial.base_temperature, 256.0, 1e-9);
    }

    #[test]
    fn test_extrapolated_quantities_clamp_at_zero() {
        let mut profile = ladder();
        profile.o3_vmr = vec![2e-6, 1e-6, 0.0];
        let layers = build_layers(&profile, 2000.0).unwrap();
        let partial = layers.last().unwrap();
        // o3 extrapolates negative at the station and clamps to zero
        assert_eq!(partial.o3_vmr, 0.0);
    }

    #[test]
    fn test_station_above_profile() {
        assert!(matches!(
            build_layers(&ladder(), 20000.0),
            Err(ProfileError::StationAboveProfile { .. })
        ));
    }

    #[test]
    fn test_stratospheric_humidity() {
        let mut profile = ladder();
        profile.pressure = vec![20.0, 200.0, 400.0];
        let layers = build_layers(&profile, 12000.0).unwrap();
        assert_eq!(layers[0].humidity, Humidity::Vmr(5e-6));
        let text = layers[0].to_string();
        assert!(text.contains("column h2o vmr 5.000e-06\n"));
    }

    #[test]
    fn test_rh_top_level_boundary() {
        let mut profile = ladder();
        profile.pressure = vec![29.0, 30.0, 400.0];
        let layers = build_layers(&profile, 12000.0).unwrap();

        // Exactly at the top level: fixed mixing ratio
        assert_eq!(layers[0].humidity, Humidity::Vmr(STRAT_H2O_VMR));
        // Just below it in altitude: relative humidity over ice (215 K midpoint)
        assert_eq!(layers[1].humidity, Humidity::RelativeIce(15.0));

        let text = render_layers(
            &LayerPreamble::new(
                &ForecastCycle::parse("2020031618").unwrap().hour_at(0),
                &Station::new("Sw", "SMA", 19.824, -155.478, 12000.0),
            ),
            &layers,
        );
        assert!(text.contains(
            "Pbase 29.0 mbar  # 16000.0 m\n\
             Tbase 210.0 K\n\
             column dry_air vmr\n\
             column o3 vmr 2.000e-06\n\
             column h2o vmr 5.000e-06\n\
             \n"
        ));
        assert!(text.contains(
            "Pbase 30.0 mbar  # 12000.0 m\n\
             Tbase 220.0 K\n\
             column dry_air vmr\n\
             column o3 vmr 1.500e-06\n\
             column h2o RHi 15.00%\n"
        ));
    }

    #[test]
    fn test_layer_text() {
        let layer = AtmosphericLayer {
            base_pressure: 600.0,
            base_height: 4200.04,
            base_temperature: 266.04,
            mid_temperature: 264.0,
            o3_vmr: 3.62e-8,
            humidity: Humidity::Relative(37.5),
            liquid_column: 0.0,
            ice_column: 0.0,
        };
        assert_eq!(
            layer.to_string(),
            "layer\n\
             Pbase 600.0 mbar  # 4200.0 m\n\
             Tbase 266.0 K\n\
             column dry_air vmr\n\
             column o3 vmr 3.620e-08\n\
             column h2o RH 37.50%\n\
             \n"
        );
    }

    #[test]
    fn test_zero_humidity_omits_directive() {
        let layer = AtmosphericLayer {
            base_pressure: 600.0,
            base_height: 4200.0,
            base_temperature: 266.0,
            mid_temperature: 264.0,
            o3_vmr: 0.0,
            humidity: Humidity::Relative(0.0),
            liquid_column: 0.0,
            ice_column: 0.0,
        };
        assert!(!layer.to_string().contains("h2o"));
        assert!(!layer.to_string().contains("o3"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let hour = ForecastCycle::parse("2020031618").unwrap().hour_at(37);
        let station = Station::new("Sw", "SMA", 19.824, -155.478, 9500.0);
        let preamble = LayerPreamble::new(&hour, &station);
        let layers = build_layers(&ladder(), station.alt).unwrap();

        let first = render_layers(&preamble, &layers);
        let second = render_layers(&preamble, &build_layers(&ladder(), station.alt).unwrap());
        assert_eq!(first, second);
        assert!(first.contains("#                   Cycle: 18 UT\n"));
        assert!(first.contains("#                 Product: 037 hour forecast\n"));
        assert!(first.contains("#                latitude: 19.824 deg. N\n"));
        assert!(first.contains("#   Geopotential altitude: 9500 m\n"));
        assert_eq!(first.matches("layer\n").count(), 3);
    }
}
