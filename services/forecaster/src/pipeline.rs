//! Per-station, per-cycle forecast driver.
//!
//! Each forecast hour moves through fetch, profile, engine and parse. A
//! failure after the fetch skips only that hour and leaves a diagnostic
//! record; a retrieval that exhausts its budget ends the whole cycle.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use am_model::{parse_output, AmError, AmHeader, ModelEngine};
use bytes::Bytes;
use met_common::{forecast_offsets, ForecastCycle, ForecastHour, Station};
use metrics::histogram;
use profile::{
    build_layers, render_layers, AuxiliaryFields, LayerPreamble, ProfileExtractor, ProfileResult,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::output::{TableWriter, TimeSeriesRecord};
use crate::retrieval::{GribSource, RetrievalController, RetrievalError, RetrievalRequest};
use crate::sink::{FailureReport, FailureSink, FailureStage};
use crate::stats::RunStats;

/// Delay after each emitted row, keeping the request rate polite.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Failed to write forecast output: {0}")]
    Output(#[from] std::io::Error),
}

/// Result of one forecast hour that did not abort the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum HourOutcome {
    Emitted {
        record: TimeSeriesRecord,
        auxiliary: AuxiliaryFields,
    },
    Skipped(FailureStage),
}

/// Counts for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub emitted: usize,
    pub skipped: usize,
}

/// Layer text and auxiliary fields for one hour.
struct PreparedHour {
    layers: String,
    auxiliary: AuxiliaryFields,
    defaulted: usize,
}

pub struct Forecaster<S, E> {
    controller: RetrievalController<S>,
    extractor: ProfileExtractor,
    header: AmHeader,
    engine: E,
    sink: Arc<dyn FailureSink>,
    pacing: Duration,
    hour_limit: Option<u32>,
}

impl<S: GribSource, E: ModelEngine> Forecaster<S, E> {
    pub fn new(controller: RetrievalController<S>, engine: E, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            controller,
            extractor: ProfileExtractor::new(),
            header: AmHeader::default(),
            engine,
            sink,
            pacing: DEFAULT_PACING_DELAY,
            hour_limit: None,
        }
    }

    pub fn with_header(mut self, header: AmHeader) -> Self {
        self.header = header;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Only process offsets below `limit` hours.
    pub fn with_hour_limit(mut self, limit: Option<u32>) -> Self {
        self.hour_limit = limit;
        self
    }

    pub fn controller(&self) -> &RetrievalController<S> {
        &self.controller
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Offsets this forecaster will process for a cycle.
    pub fn offsets(&self) -> impl Iterator<Item = u32> {
        let limit = self.hour_limit;
        forecast_offsets().take_while(move |&offset| limit.map_or(true, |limit| offset < limit))
    }

    /// Write the table for `station` and `cycle`.
    ///
    /// Stops at the first hour whose retrieval is exhausted; rows already
    /// written stay in `out`.
    #[instrument(skip(self, station, out, stats), fields(vex = %station.vex, cycle = %cycle))]
    pub async fn run_cycle<W: Write>(
        &self,
        station: &Station,
        cycle: ForecastCycle,
        out: &mut TableWriter<W>,
        stats: &mut RunStats,
    ) -> Result<CycleSummary, ForecastError> {
        out.write_header()?;
        let mut summary = CycleSummary::default();

        for offset in self.offsets() {
            let hour = cycle.hour_at(offset);
            match self.process_hour(station, hour, stats).await {
                Ok(HourOutcome::Emitted { record, auxiliary }) => {
                    out.write_record(&record, &auxiliary)?;
                    stats.record_emitted();
                    summary.emitted += 1;
                    tokio::time::sleep(self.pacing).await;
                }
                Ok(HourOutcome::Skipped(stage)) => {
                    stats.record_skipped(stage.as_str());
                    summary.skipped += 1;
                }
                Err(e) => {
                    stats.record_cycle_aborted();
                    return Err(e);
                }
            }
        }

        stats.record_cycle_completed();
        info!(
            emitted = summary.emitted,
            skipped = summary.skipped,
            "Cycle complete"
        );
        Ok(summary)
    }

    /// Fetch, profile, run and parse one forecast hour.
    #[instrument(skip(self, station, stats), fields(vex = %station.vex, hour = hour.offset))]
    pub async fn process_hour(
        &self,
        station: &Station,
        hour: ForecastHour,
        stats: &mut RunStats,
    ) -> Result<HourOutcome, ForecastError> {
        let request = RetrievalRequest::new(station, &hour);
        let started = Instant::now();
        let payload = self.controller.fetch(&request, &mut stats.retrieval).await?;
        record_stage_latency("fetch", started);

        let started = Instant::now();
        let prepared = match self.prepare(station, &hour, payload.clone()) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "Problem turning GRIB into layers");
                self.report(
                    FailureReport::new(station, hour, FailureStage::Profile, e.to_string())
                        .with_payload(payload),
                );
                return Ok(HourOutcome::Skipped(FailureStage::Profile));
            }
        };
        stats.record_defaulted(prepared.defaulted);
        record_stage_latency("profile", started);

        let input = self.header.compose(&prepared.layers);
        let started = Instant::now();
        let output = match self.engine.run(&input).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Problem running am");
                let mut report =
                    FailureReport::new(station, hour, FailureStage::Engine, e.to_string())
                        .with_input(input);
                if let AmError::BadExit { code, .. } = &e {
                    report = report.with_exit_code(*code);
                }
                if let Some((stdout, stderr)) = e.streams() {
                    report = report.with_streams(stdout, stderr);
                }
                self.report(report);
                return Ok(HourOutcome::Skipped(FailureStage::Engine));
            }
        };
        record_stage_latency("engine", started);
        if output.exit_code != 0 {
            debug!(exit_code = output.exit_code, "am exited with a warning");
        }

        let result = match parse_output(&output.stdout, &output.stderr) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Problem reading am output");
                self.report(
                    FailureReport::new(station, hour, FailureStage::Parse, e.to_string())
                        .with_input(input)
                        .with_exit_code(Some(output.exit_code))
                        .with_streams(output.stdout, output.stderr),
                );
                return Ok(HourOutcome::Skipped(FailureStage::Parse));
            }
        };

        let record = TimeSeriesRecord::new(&hour, result);
        debug!(row = %record, "Forecast hour complete");
        Ok(HourOutcome::Emitted {
            record,
            auxiliary: prepared.auxiliary,
        })
    }

    fn prepare(
        &self,
        station: &Station,
        hour: &ForecastHour,
        payload: Bytes,
    ) -> ProfileResult<PreparedHour> {
        let extraction = self.extractor.extract(payload, station.lat, station.lon)?;
        for field in &extraction.defaulted {
            debug!(field = field.field, level_mbar = field.level_mbar, "Field defaulted");
        }
        let layers = build_layers(&extraction.profile, station.alt)?;
        let text = render_layers(&LayerPreamble::new(hour, station), &layers);
        Ok(PreparedHour {
            layers: text,
            auxiliary: extraction.auxiliary,
            defaulted: extraction.defaulted.len(),
        })
    }

    fn report(&self, report: FailureReport) {
        if let Err(e) = self.sink.record(&report) {
            warn!(error = %e, stage = %report.stage, "Failed to save diagnostic record");
        }
    }
}

fn record_stage_latency(stage: &'static str, started: Instant) {
    histogram!("forecaster_stage_duration_seconds", "stage" => stage)
        .record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{FetchOutcome, RetryPolicy};
    use crate::sink::MemorySink;
    use am_model::{AmResult, EngineOutput};
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl GribSource for NeverCalled {
        async fn fetch(&self, _request: &RetrievalRequest) -> FetchOutcome {
            panic!("no fetch expected")
        }
    }

    #[async_trait]
    impl ModelEngine for NeverCalled {
        async fn run(&self, _input: &str) -> AmResult<EngineOutput> {
            panic!("no run expected")
        }
    }

    fn forecaster(limit: Option<u32>) -> Forecaster<NeverCalled, NeverCalled> {
        Forecaster::new(
            RetrievalController::new(NeverCalled, RetryPolicy::default()),
            NeverCalled,
            Arc::new(MemorySink::new()),
        )
        .with_hour_limit(limit)
    }

    #[test]
    fn test_hour_limit() {
        assert_eq!(forecaster(None).offsets().count(), 209);
        assert_eq!(forecaster(Some(1)).offsets().collect::<Vec<_>>(), vec![0]);
        assert_eq!(forecaster(Some(0)).offsets().count(), 0);
        assert_eq!(forecaster(Some(125)).offsets().last(), Some(123));
    }

    #[tokio::test]
    async fn test_empty_schedule_writes_header_only() {
        let station = Station::new("Sw", "SMA", 19.824, -155.478, 4080.0);
        let cycle = ForecastCycle::parse("2020031618").unwrap();
        let mut out = TableWriter::new(Vec::new(), None);
        let mut stats = RunStats::default();
        let summary = forecaster(Some(0))
            .run_cycle(&station, cycle, &mut out, &mut stats)
            .await
            .unwrap();
        assert_eq!(summary, CycleSummary::default());
        assert_eq!(stats.cycles_completed, 1);
        let (table, _) = out.into_inner();
        assert_eq!(String::from_utf8(table).unwrap().lines().count(), 1);
    }
}
