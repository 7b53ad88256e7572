//! Physical constants used when building model layers.

/// Standard gravity [m / s^2]
pub const G_STD: f64 = 9.80665;

/// Mean molar mass of dry air [g / mol]
pub const M_AIR: f64 = 28.964;

/// Molar mass of ozone [g / mol]
pub const M_O3: f64 = 47.997;

/// Below this temperature [K] condensed water is treated as ice
pub const H2O_SUPERCOOL_LIMIT: f64 = 238.0;

pub const PASCAL_ON_MBAR: f64 = 100.0;

/// Layers with base pressure at or below this value [mbar], that is at or
/// above this altitude, use a fixed stratospheric water vapour mixing ratio
/// instead of relative humidity
pub const RH_TOP_PLEVEL: f64 = 29.0;

pub const STRAT_H2O_VMR: f64 = 5e-6;
