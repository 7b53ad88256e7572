//! Common types and utilities shared across the forecaster crates.

pub mod bbox;
pub mod error;
pub mod format;
pub mod grid;
pub mod station;
pub mod time;

pub use bbox::CellBox;
pub use error::{MetError, MetResult};
pub use format::{format_sci, format_sci_width};
pub use grid::{LATLON_DELTA, LATLON_GRID_STR, PRESSURE_LEVELS_MBAR};
pub use station::Station;
pub use time::{forecast_offsets, ForecastCycle, ForecastHour, FORECAST_OFFSET_COUNT};
