//! GFS subset retrieval from the NOMADS filter CGI.
//!
//! Every attempt is classified into an [`Attempt`]: the payload, or a
//! transient failure with a cost against the try budget and a base delay.
//! Budget is kept in tenths of a try so that cheap failures (server errors
//! NOMADS emits while its website is broken) can cost a fifth of a try
//! exactly.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use met_common::{
    CellBox, ForecastHour, Station, LATLON_DELTA, LATLON_GRID_STR, PRESSURE_LEVELS_MBAR,
};
use rand::Rng;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::stats::RetrievalStats;

/// Profile variables requested at every pressure level.
pub const PROFILE_VARIABLES: [&str; 6] = ["CLWMR", "ICMR", "HGT", "O3MR", "RH", "TMP"];

/// Surface and wind variables written to the `.extra` file.
pub const AUXILIARY_VARIABLES: [&str; 7] =
    ["CSNOW", "CICEP", "CFRZR", "CRAIN", "GUST", "UGRD", "VGRD"];

/// Non-isobaric levels the auxiliary variables live on.
pub const AUXILIARY_LEVELS: [&str; 3] = ["surface", "max_wind", "10_m_above_ground"];

const TRY: u32 = 10;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Gave up on {file} after {attempts} attempts, last failure: {last}")]
    Exhausted {
        file: String,
        attempts: u32,
        last: String,
    },

    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// One NOMADS filter query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    /// GFS file name, e.g. `gfs.t18z.pgrb2.0p25.f037`
    pub file: String,
    pub query: Vec<(String, String)>,
}

impl RetrievalRequest {
    /// Query for the grid cell around `station` at `hour`.
    pub fn new(station: &Station, hour: &ForecastHour) -> Self {
        let cell = CellBox::around(station.lat, station.lon, LATLON_DELTA);
        let file = format!(
            "gfs.t{:02}z.pgrb2.{}.{}",
            hour.cycle.hour(),
            LATLON_GRID_STR,
            hour.product()
        );

        let mut query = vec![
            ("dir".to_string(), format!("/gfs.{}", hour.cycle.day_hour())),
            ("file".to_string(), file.clone()),
            ("subregion".to_string(), String::new()),
            ("leftlon".to_string(), cell.left_lon.to_string()),
            ("rightlon".to_string(), cell.right_lon.to_string()),
            ("toplat".to_string(), cell.top_lat.to_string()),
            ("bottomlat".to_string(), cell.bottom_lat.to_string()),
        ];
        for mbar in PRESSURE_LEVELS_MBAR {
            query.push((format!("lev_{mbar}_mb"), "on".to_string()));
        }
        for level in AUXILIARY_LEVELS {
            query.push((format!("lev_{level}"), "on".to_string()));
        }
        for var in PROFILE_VARIABLES.iter().chain(AUXILIARY_VARIABLES.iter()) {
            query.push((format!("var_{var}"), "on".to_string()));
        }

        Self { file, query }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// What one HTTP attempt produced, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 200 with its body, possibly empty
    Body(Bytes),
    /// Any other final status
    Status { code: u16, has_location: bool },
    ConnectFailed(String),
    ReadTimeout(String),
    /// Body shorter than announced, or cut off mid-stream
    Truncated(String),
    Transport(String),
}

/// Performs single HTTP attempts.
#[async_trait]
pub trait GribSource: Send + Sync {
    async fn fetch(&self, request: &RetrievalRequest) -> FetchOutcome;
}

/// The NOMADS `filter_gfs_0p25_1hr.pl` endpoint.
pub struct NomadsSource {
    client: Client,
    base_url: String,
}

impl NomadsSource {
    /// `read_timeout` bounds the whole response once the request is sent.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl GribSource for NomadsSource {
    async fn fetch(&self, request: &RetrievalRequest) -> FetchOutcome {
        let response = match self
            .client
            .get(&self.base_url)
            .query(&request.query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport(&e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return FetchOutcome::Status {
                code: status.as_u16(),
                has_location: response.headers().contains_key(header::LOCATION),
            };
        }

        let expected = response.content_length();
        match response.bytes().await {
            Ok(body) => match expected {
                Some(expected) if (body.len() as u64) < expected => FetchOutcome::Truncated(
                    format!("received {} of {} bytes", body.len(), expected),
                ),
                _ => FetchOutcome::Body(body),
            },
            Err(e) if e.is_timeout() => FetchOutcome::ReadTimeout(e.to_string()),
            Err(e) if e.is_body() || e.is_decode() => FetchOutcome::Truncated(e.to_string()),
            Err(e) => FetchOutcome::Transport(e.to_string()),
        }
    }
}

fn classify_transport(e: &reqwest::Error) -> FetchOutcome {
    if e.is_connect() {
        FetchOutcome::ConnectFailed(e.to_string())
    } else if e.is_timeout() {
        FetchOutcome::ReadTimeout(e.to_string())
    } else {
        FetchOutcome::Transport(e.to_string())
    }
}

/// Retry tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub retry_delay: Duration,
    pub rate_limit_delay: Duration,
    pub not_yet_produced_delay: Duration,
    /// Keep retrying, free of charge, while the product is not yet produced
    /// or the server is unreachable.
    pub wait: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 8,
            retry_delay: Duration::from_secs(60),
            rate_limit_delay: Duration::from_secs(60),
            not_yet_produced_delay: Duration::from_secs(300),
            wait: false,
        }
    }
}

/// A classified failure: budget cost in tenths of a try and the base of
/// the delay before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Transient {
    pub cost: u32,
    pub delay: Duration,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Accepted(Bytes),
    Transient(Transient),
}

impl RetryPolicy {
    /// Classify one outcome, recording it in `stats`.
    pub fn classify(&self, outcome: FetchOutcome, stats: &mut RetrievalStats) -> Attempt {
        let transient = |cost: u32, delay: Duration, reason: String| {
            Attempt::Transient(Transient {
                cost,
                delay,
                reason,
            })
        };

        match outcome {
            FetchOutcome::Body(body) => {
                stats.record_status(200);
                stats.record_bytes(body.len());
                if body.is_empty() {
                    stats.record_empty_body();
                    transient(TRY, self.retry_delay, "empty body".to_string())
                } else {
                    Attempt::Accepted(body)
                }
            }
            FetchOutcome::Status { code, has_location } => {
                stats.record_status(code);
                let reason = format!("status {code}");
                let not_yet = || "data not yet available (404)".to_string();
                match code {
                    404 if self.wait => transient(0, self.not_yet_produced_delay, not_yet()),
                    404 => transient(TRY, self.retry_delay, not_yet()),
                    403 | 429 | 503 => transient(0, self.rate_limit_delay, reason),
                    300..=399 if !has_location => transient(0, self.rate_limit_delay, reason),
                    500 | 502 | 504 => transient(TRY / 5, self.retry_delay, reason),
                    _ => transient(TRY, self.retry_delay, reason),
                }
            }
            FetchOutcome::ConnectFailed(e) => {
                stats.record_connect_error();
                let cost = if self.wait { 0 } else { TRY };
                transient(cost, self.retry_delay, format!("connection failed: {e}"))
            }
            FetchOutcome::ReadTimeout(e) => {
                stats.record_read_timeout();
                transient(TRY, self.retry_delay, format!("download timed out: {e}"))
            }
            FetchOutcome::Truncated(e) => {
                stats.record_truncated();
                transient(TRY, self.retry_delay, format!("truncated body: {e}"))
            }
            FetchOutcome::Transport(e) => {
                stats.record_transport_error();
                transient(TRY, self.retry_delay, format!("transport error: {e}"))
            }
        }
    }
}

/// Uniform in `[base, base + base/3]`.
pub fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(base_ms..=base_ms + base_ms / 3))
}

/// Drives attempts against a [`GribSource`] until one is accepted or the
/// budget runs out.
pub struct RetrievalController<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: GribSource> RetrievalController<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch the payload for `request`.
    ///
    /// Returns [`RetrievalError::Exhausted`] once the budget reaches zero;
    /// no request is made and no delay is slept after that point.
    #[instrument(skip(self, request, stats), fields(file = %request.file))]
    pub async fn fetch(
        &self,
        request: &RetrievalRequest,
        stats: &mut RetrievalStats,
    ) -> Result<Bytes, RetrievalError> {
        let mut budget = i64::from(self.policy.max_tries) * i64::from(TRY);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = self.source.fetch(request).await;
            let transient = match self.policy.classify(outcome, stats) {
                Attempt::Accepted(body) => {
                    debug!(attempts, bytes = body.len(), "Retrieved payload");
                    return Ok(body);
                }
                Attempt::Transient(transient) => transient,
            };

            if transient.cost == 0 {
                stats.record_free_retry();
            }
            budget -= i64::from(transient.cost);
            if budget <= 0 {
                stats.record_exhausted();
                warn!(attempts, reason = %transient.reason, "Giving up");
                return Err(RetrievalError::Exhausted {
                    file: request.file.clone(),
                    attempts,
                    last: transient.reason,
                });
            }

            let delay = jittered(transient.delay);
            info!(
                attempts,
                reason = %transient.reason,
                budget_tries = budget as f64 / f64::from(TRY),
                delay_secs = delay.as_secs_f64(),
                "Retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
