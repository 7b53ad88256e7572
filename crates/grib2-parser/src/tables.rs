//! GRIB2 parameter and level lookup tables.
//!
//! Translates GRIB2 numeric codes into the short names used by the NOMADS
//! filter (`TMP`, `HGT`, ...) and into readable level descriptions.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Level description - either static text or a template with a placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface", "max wind")
    Static(String),
    /// Template with `{value}` or `{value_mb}` placeholder
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting placeholders if it's a template.
    ///
    /// - `{value}` - level value as stored (e.g., 10 for 10 m above ground)
    /// - `{value_mb}` - value converted from Pa to mbar
    pub fn format(&self, value: f64) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => t
                .replace("{value}", &value.to_string())
                .replace("{value_mb}", &(value / 100.0).to_string()),
        }
    }
}

/// GRIB2 parameter and level lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    parameters: HashMap<ParamKey, String>,
    levels: HashMap<u8, LevelDescription>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables covering every GFS field the forecaster requests.
    pub fn gfs() -> Self {
        let mut tables = Self::new();

        let parameters: [(ParamKey, &str); 13] = [
            ((0, 0, 0), "TMP"),
            ((0, 1, 1), "RH"),
            ((0, 1, 22), "CLWMR"),
            ((0, 1, 23), "ICMR"),
            ((0, 1, 192), "CRAIN"),
            ((0, 1, 193), "CFRZR"),
            ((0, 1, 194), "CICEP"),
            ((0, 1, 195), "CSNOW"),
            ((0, 2, 2), "UGRD"),
            ((0, 2, 3), "VGRD"),
            ((0, 2, 22), "GUST"),
            ((0, 3, 5), "HGT"),
            ((0, 14, 192), "O3MR"),
        ];
        for ((discipline, category, number), name) in parameters {
            tables.add_parameter(discipline, category, number, name.to_string());
        }

        tables.add_level(1, LevelDescription::Static("surface".to_string()));
        tables.add_level(6, LevelDescription::Static("max wind".to_string()));
        tables.add_level(100, LevelDescription::Template("{value_mb} mb".to_string()));
        tables.add_level(
            103,
            LevelDescription::Template("{value} m above ground".to_string()),
        );

        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Add a level description mapping
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    pub fn get_level_description(&self, level_type: u8, level_value: f64) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }
}
