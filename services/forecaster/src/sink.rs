//! Diagnostic records for hours that produced no output row.

use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use met_common::{ForecastHour, Station};
use tracing::warn;

/// Pipeline stage an hour failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// GRIB decode, interpolation or layer construction
    Profile,
    /// Launch failure, timeout or unusable exit status
    Engine,
    /// Model output missing a mandatory quantity
    Parse,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Profile => "profile",
            FailureStage::Engine => "engine",
            FailureStage::Parse => "parse",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to reproduce a failed hour by hand.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub vex: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub hour: ForecastHour,
    pub stage: FailureStage,
    pub reason: String,
    /// Complete model input, header included
    pub input: Option<String>,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Raw GRIB2 payload, kept for profile failures
    pub payload: Option<Bytes>,
}

impl FailureReport {
    pub fn new(
        station: &Station,
        hour: ForecastHour,
        stage: FailureStage,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            vex: station.vex.clone(),
            lat: station.lat,
            lon: station.lon,
            alt: station.alt,
            hour,
            stage,
            reason: reason.into(),
            input: None,
            exit_code: None,
            stdout: None,
            stderr: None,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_streams(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self.stderr = Some(stderr.into());
        self
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Plain-text form written to diagnostic files.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "am_problem: {}", self.reason);
        let _ = writeln!(
            out,
            "stage: {}  station: {}  cycle: {}  hour: {}",
            self.stage, self.vex, self.hour.cycle, self.hour.offset
        );
        let _ = writeln!(
            out,
            "lat {} lon {} alt {}",
            self.lat, self.lon, self.alt
        );
        if let Some(code) = self.exit_code {
            let _ = writeln!(out, "exit code: {code}");
        }
        if let Some(payload) = &self.payload {
            let _ = writeln!(out, "payload: {} bytes", payload.len());
        }
        if let Some(input) = &self.input {
            out.push_str("Input:\n\n");
            out.push_str(input);
        }
        if self.stdout.is_some() || self.stderr.is_some() {
            out.push_str("\nOutput:\n\n");
            out.push_str(self.stderr.as_deref().unwrap_or_default());
            out.push_str(self.stdout.as_deref().unwrap_or_default());
        }
        out
    }
}

/// Destination for [`FailureReport`]s.
pub trait FailureSink: Send + Sync {
    fn record(&self, report: &FailureReport) -> std::io::Result<()>;
}

/// Writes each report to a fresh `<prefix>XXXXXX.txt` in a directory, with
/// the raw payload beside it as `<prefix>XXXXXX.grb`. Existing files are
/// never overwritten.
#[derive(Debug, Clone)]
pub struct TempFileSink {
    dir: PathBuf,
    prefix: String,
}

impl TempFileSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Persist `report`, returning the path of the text record.
    pub fn write(&self, report: &FailureReport) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(".txt")
            .tempfile_in(&self.dir)?;
        file.write_all(report.render().as_bytes())?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        if let Some(payload) = &report.payload {
            let grb = path.with_extension("grb");
            let mut out = OpenOptions::new().write(true).create_new(true).open(&grb)?;
            out.write_all(payload)?;
        }
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FailureSink for TempFileSink {
    fn record(&self, report: &FailureReport) -> std::io::Result<()> {
        let path = self.write(report)?;
        warn!(
            vex = %report.vex,
            hour = report.hour.offset,
            stage = %report.stage,
            path = %path.display(),
            "Saved diagnostic record"
        );
        Ok(())
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<FailureReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureSink for MemorySink {
    fn record(&self, report: &FailureReport) -> std::io::Result<()> {
        let mut reports = self
            .reports
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "failure sink poisoned"))?;
        reports.push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use met_common::ForecastCycle;

    fn report(stage: FailureStage) -> FailureReport {
        let station = Station::new("Sw", "SMA", 19.824, -155.478, 4080.0);
        let hour = ForecastCycle::parse("2020031618").unwrap().hour_at(37);
        FailureReport::new(&station, hour, stage, "saw returncode of 3")
    }

    #[test]
    fn test_render_engine_failure() {
        let text = report(FailureStage::Engine)
            .with_input("f 225 GHz 225 GHz 1 GHz\nlayer\n")
            .with_exit_code(Some(3))
            .with_streams("", "! Error: parse error.\n")
            .render();
        assert!(text.starts_with("am_problem: saw returncode of 3\n"));
        assert!(text.contains("stage: engine  station: Sw  cycle: 2020031618  hour: 37\n"));
        assert!(text.contains("exit code: 3\n"));
        assert!(text.contains("Input:\n\nf 225 GHz 225 GHz 1 GHz\nlayer\n"));
        assert!(text.ends_with("\nOutput:\n\n! Error: parse error.\n"));
    }

    #[test]
    fn test_temp_file_sink_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TempFileSink::new(dir.path(), "am-problem-");
        let payload = Bytes::from_static(b"GRIB....7777");

        let first = sink
            .write(&report(FailureStage::Profile).with_payload(payload.clone()))
            .unwrap();
        let second = sink
            .write(&report(FailureStage::Profile).with_payload(payload.clone()))
            .unwrap();
        assert_ne!(first, second);

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("am-problem-"));
        assert!(name.ends_with(".txt"));
        assert_eq!(std::fs::read(first.with_extension("grb")).unwrap(), payload.to_vec());

        let text = std::fs::read_to_string(&second).unwrap();
        assert!(text.contains("payload: 12 bytes"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.record(&report(FailureStage::Parse)).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.reports()[0].stage, FailureStage::Parse);
    }
}
