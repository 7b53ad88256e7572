//! GFS grid constants.

/// Resolution token used in NOMADS file and script names.
pub const LATLON_GRID_STR: &str = "0p25";

/// Grid spacing in degrees.
pub const LATLON_DELTA: f64 = 0.25;

/// Isobaric levels (mbar) requested from the model, lowest pressure first.
pub const PRESSURE_LEVELS_MBAR: [u32; 31] = [
    1, 2, 3, 5, 7, 10, 20, 30, 50, 70, 100, 150, 200, 250, 300, 350, 400, 450, 500, 550, 600,
    650, 700, 750, 800, 850, 900, 925, 950, 975, 1000,
];
