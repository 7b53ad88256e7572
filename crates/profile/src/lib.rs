//! Station profiles from GFS GRIB2 subsets and their `am` layer form.

pub mod constants;
pub mod error;
pub mod extract;
pub mod fields;
pub mod interpolation;
pub mod layers;
pub mod profile;

pub use error::{ProfileError, ProfileResult};
pub use extract::{AuxiliaryFields, DefaultedField, Extraction, FieldSample, ProfileExtractor};
pub use fields::{FieldIndex, LevelKey};
pub use interpolation::{grid_interp, grid_interp_vector, Corners};
pub use layers::{build_layers, render_layers, AtmosphericLayer, Humidity, LayerPreamble};
pub use profile::AtmosphericProfile;
