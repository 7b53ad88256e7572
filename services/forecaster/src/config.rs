//! Configuration loading: tuning from YAML, stations from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use met_common::Station;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::retrieval::RetryPolicy;

const BUILTIN_STATIONS: &str = include_str!("../data/stations.json");

pub const DEFAULT_BASE_URL: &str = "https://nomads.ncep.noaa.gov/cgi-bin/filter_gfs_0p25_1hr.pl";

/// Root of the optional YAML tuning file.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecasterConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-response limit once connected
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub rate_limit_delay_secs: u64,
    #[serde(default = "default_not_yet_produced_delay_secs")]
    pub not_yet_produced_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Executable; `$AM` or `am` when unset
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_engine_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_frequency_ghz")]
    pub frequency_ghz: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_diagnostics_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_diagnostics_prefix")]
    pub prefix: String,
}

fn default_pacing_delay_ms() -> u64 {
    1000
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tries() -> u32 {
    8
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_not_yet_produced_delay_secs() -> u64 {
    300
}

fn default_engine_timeout_secs() -> u64 {
    120
}

fn default_frequency_ghz() -> f64 {
    am_model::header::DEFAULT_FREQUENCY_GHZ
}

fn default_diagnostics_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_diagnostics_prefix() -> String {
    "am-problem-".to_string()
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            engine: EngineConfig::default(),
            pacing_delay_ms: default_pacing_delay_ms(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
            max_tries: default_max_tries(),
            retry_delay_secs: default_retry_delay_secs(),
            rate_limit_delay_secs: default_retry_delay_secs(),
            not_yet_produced_delay_secs: default_not_yet_produced_delay_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: default_engine_timeout_secs(),
            frequency_ghz: default_frequency_ghz(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dir: default_diagnostics_dir(),
            prefix: default_diagnostics_prefix(),
        }
    }
}

impl ForecasterConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ForecasterConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded forecaster config");
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn retry_policy(&self, wait: bool) -> RetryPolicy {
        let r = &self.retrieval;
        RetryPolicy {
            max_tries: r.max_tries,
            retry_delay: Duration::from_secs(r.retry_delay_secs),
            rate_limit_delay: Duration::from_secs(r.rate_limit_delay_secs),
            not_yet_produced_delay: Duration::from_secs(r.not_yet_produced_delay_secs),
            wait,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse a JSON station list and validate every entry.
pub fn parse_stations(json: &str) -> Result<Vec<Station>> {
    let stations: Vec<Station> =
        serde_json::from_str(json).context("Failed to parse station list")?;
    for station in &stations {
        station.validate()?;
    }
    Ok(stations)
}

/// Stations from `path`, or the built-in list.
pub fn load_stations(path: Option<&Path>) -> Result<Vec<Station>> {
    let stations = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read stations file: {}", path.display()))?;
            parse_stations(&content)
                .with_context(|| format!("Invalid stations file: {}", path.display()))?
        }
        None => parse_stations(BUILTIN_STATIONS)?,
    };
    info!(count = stations.len(), "Loaded stations");
    Ok(stations)
}

/// Result of matching `--vex` arguments against the registry.
#[derive(Debug, Default)]
pub struct StationSelection {
    pub stations: Vec<Station>,
    pub unknown: Vec<String>,
}

/// Resolve `--vex` values (each possibly a comma list) to stations.
///
/// No values selects every station. Unknown codes are collected rather
/// than failing the run.
pub fn select_stations(all: &[Station], vex_args: &[String]) -> StationSelection {
    if vex_args.is_empty() {
        return StationSelection {
            stations: all.to_vec(),
            unknown: Vec::new(),
        };
    }

    let mut selection = StationSelection::default();
    for vex in vex_args
        .iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        match all.iter().find(|s| s.vex == vex) {
            Some(station) => {
                if !selection.stations.iter().any(|s| s.vex == vex) {
                    selection.stations.push(station.clone());
                }
            }
            None => {
                warn!(vex = %vex, "Unknown vex");
                selection.unknown.push(vex.to_string());
            }
        }
    }
    selection
}
