//! Forecast cycle and forecast hour handling.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetError, MetResult};

/// Hours between consecutive model cycles.
pub const CYCLE_INTERVAL_HOURS: u32 = 6;

/// Number of offsets produced by [`forecast_offsets`].
pub const FORECAST_OFFSET_COUNT: usize = 121 + 88;

/// Timestamp used for output file names: `YYYYMMDD_HH:00:00`.
pub const FILE_TIMESTAMP: &str = "%Y%m%d_%H:00:00";

/// Timestamp used for output rows: `YYYYMMDD_HH:MM:SS`.
pub const ROW_TIMESTAMP: &str = "%Y%m%d_%H:%M:%S";

/// Forecast offsets in hours: hourly to 120, then every 3 hours to 384.
pub fn forecast_offsets() -> impl Iterator<Item = u32> {
    (0..=120).chain((123..=384).step_by(3))
}

/// A model initialization time aligned to a 6-hour boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForecastCycle(DateTime<Utc>);

impl ForecastCycle {
    /// Wrap a reference time, rejecting anything off the 00/06/12/18 grid.
    pub fn new(reference_time: DateTime<Utc>) -> MetResult<Self> {
        let aligned = reference_time.hour() % CYCLE_INTERVAL_HOURS == 0
            && reference_time.minute() == 0
            && reference_time.second() == 0
            && reference_time.nanosecond() == 0;
        if !aligned {
            return Err(MetError::UnalignedCycle(reference_time.to_rfc3339()));
        }
        Ok(Self(reference_time))
    }

    /// Most recent cycle whose data should exist `lag_hours` after `now`.
    pub fn latest(now: DateTime<Utc>, lag_hours: f64) -> Self {
        let lagged = now - Duration::seconds((lag_hours * 3600.0) as i64);
        let hour = lagged.hour() / CYCLE_INTERVAL_HOURS * CYCLE_INTERVAL_HOURS;
        let start = lagged
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .unwrap_or_else(|| lagged.date_naive().and_time(Default::default()));
        Self(Utc.from_utc_datetime(&start))
    }

    /// Parse `YYYYMMDD` (00 UTC implied) or `YYYYMMDDHH`.
    pub fn parse(s: &str) -> MetResult<Self> {
        let invalid = || MetError::InvalidCycleFormat(s.to_string());
        let (date, hour) = match s.len() {
            8 => (s, "00"),
            10 => (&s[..8], &s[8..]),
            _ => return Err(invalid()),
        };
        let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid())?;
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let start = date.and_hms_opt(hour, 0, 0).ok_or_else(invalid)?;
        Self::new(Utc.from_utc_datetime(&start))
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.0
    }

    /// Cycle hour (0, 6, 12 or 18).
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// `YYYYMMDD`
    pub fn day(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// `YYYYMMDD/HH`, the NOMADS directory component.
    pub fn day_hour(&self) -> String {
        self.0.format("%Y%m%d/%H").to_string()
    }

    /// Output file name for this cycle.
    pub fn file_stamp(&self) -> String {
        self.0.format(FILE_TIMESTAMP).to_string()
    }

    /// The cycle `steps` cycles earlier.
    pub fn earlier(&self, steps: u32) -> Self {
        Self(self.0 - Duration::hours(i64::from(steps * CYCLE_INTERVAL_HOURS)))
    }

    /// Cycles from this one back through `backfill_hours`, newest first.
    pub fn with_backfill(&self, backfill_hours: u32) -> Vec<Self> {
        (0..=backfill_hours / CYCLE_INTERVAL_HOURS)
            .map(|steps| self.earlier(steps))
            .collect()
    }

    pub fn hour_at(&self, offset: u32) -> ForecastHour {
        ForecastHour { cycle: *self, offset }
    }
}

impl std::fmt::Display for ForecastCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d%H"))
    }
}

/// A forecast offset within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastHour {
    pub cycle: ForecastCycle,
    pub offset: u32,
}

impl ForecastHour {
    /// Reference time plus the forecast offset.
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.cycle.reference_time() + Duration::hours(i64::from(self.offset))
    }

    /// GFS product suffix, e.g. `f037`.
    pub fn product(&self) -> String {
        format!("f{:03}", self.offset)
    }

    /// Row timestamp of the valid time.
    pub fn timestamp(&self) -> String {
        self.valid_time().format(ROW_TIMESTAMP).to_string()
    }
}
