//! GFS → `am` opacity forecasts for a set of observing stations.
//!
//! For each station and model cycle the forecaster retrieves a GFS subset
//! around the station for every forecast hour, builds an atmospheric
//! profile down to the station altitude, runs the `am` radiative transfer
//! model on it and appends one row of opacity, brightness temperature and
//! column totals to a fixed-width table.

pub mod config;
pub mod output;
pub mod pipeline;
pub mod retrieval;
pub mod sink;
pub mod stats;

pub use config::{load_stations, select_stations, ForecasterConfig, StationSelection};
pub use output::{
    is_complete, output_path, table_header, TableWriter, TimeSeriesRecord, EXPECTED_LINES,
};
pub use pipeline::{CycleSummary, ForecastError, Forecaster, HourOutcome};
pub use retrieval::{
    FetchOutcome, GribSource, NomadsSource, RetrievalController, RetrievalError, RetrievalRequest,
    RetryPolicy,
};
pub use sink::{FailureReport, FailureSink, FailureStage, MemorySink, TempFileSink};
pub use stats::{RetrievalStats, RunStats};
