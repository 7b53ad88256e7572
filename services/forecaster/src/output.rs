//! Fixed-width forecast tables and their `.extra` JSON-lines companions.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use am_model::ModelResult;
use met_common::{format_sci_width, ForecastCycle, ForecastHour, FORECAST_OFFSET_COUNT};
use profile::AuxiliaryFields;
use serde::Serialize;
use tracing::debug;

/// Header line plus one row per forecast offset.
pub const EXPECTED_LINES: usize = FORECAST_OFFSET_COUNT + 1;

const TABLE_COLUMNS: [&str; 8] = [
    "#",
    "date",
    "tau255",
    "Tb[K]",
    "pwv[mm]",
    "lwp[kg*m^-2]",
    "iwp[kg*m^-2]",
    "o3[DU]",
];

/// `#            date       tau255        Tb[K] ...`
pub fn table_header() -> String {
    let mut line = format!("{:1}{:>16}", TABLE_COLUMNS[0], TABLE_COLUMNS[1]);
    for column in &TABLE_COLUMNS[2..] {
        line.push_str(&format!(" {column:>12}"));
    }
    line
}

/// One successful forecast hour.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRecord {
    /// Valid time, `YYYYMMDD_HH:MM:SS`
    pub timestamp: String,
    pub result: ModelResult,
}

impl TimeSeriesRecord {
    pub fn new(hour: &ForecastHour, result: ModelResult) -> Self {
        Self {
            timestamp: hour.timestamp(),
            result,
        }
    }
}

impl fmt::Display for TimeSeriesRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.result;
        write!(f, "{}", self.timestamp)?;
        for value in [r.tau, r.tb, r.pwv, r.lwp, r.iwp, r.o3] {
            write!(f, " {}", format_sci_width(value, 4, 12))?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ExtraLine<'a> {
    date: &'a str,
    #[serde(flatten)]
    auxiliary: &'a AuxiliaryFields,
}

/// Writes the table and, optionally, the auxiliary JSON lines.
pub struct TableWriter<W: Write> {
    table: W,
    extra: Option<W>,
}

impl<W: Write> TableWriter<W> {
    pub fn new(table: W, extra: Option<W>) -> Self {
        Self { table, extra }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.table, "{}", table_header())?;
        self.table.flush()
    }

    pub fn write_record(
        &mut self,
        record: &TimeSeriesRecord,
        auxiliary: &AuxiliaryFields,
    ) -> io::Result<()> {
        writeln!(self.table, "{record}")?;
        self.table.flush()?;

        if let Some(extra) = self.extra.as_mut() {
            let line = ExtraLine {
                date: &record.timestamp,
                auxiliary,
            };
            serde_json::to_writer(&mut *extra, &line)?;
            writeln!(extra)?;
            extra.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> (W, Option<W>) {
        (self.table, self.extra)
    }
}

impl TableWriter<BufWriter<File>> {
    /// Create (truncating) `path` and `path.extra`.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let table = BufWriter::new(File::create(path)?);
        let extra = BufWriter::new(File::create(extra_path(path))?);
        Ok(Self::new(table, Some(extra)))
    }
}

/// `<dir>/<vex>/<YYYYMMDD_HH:00:00>`
pub fn output_path(dir: &Path, vex: &str, cycle: &ForecastCycle) -> PathBuf {
    dir.join(vex).join(cycle.file_stamp())
}

pub fn extra_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".extra");
    PathBuf::from(name)
}

/// True when `path` holds a header and every forecast row.
pub fn is_complete(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let count = content.lines().count();
            if count != EXPECTED_LINES {
                debug!(path = %path.display(), lines = count, "Output incomplete");
            }
            count == EXPECTED_LINES
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Output not readable");
            false
        }
    }
}
