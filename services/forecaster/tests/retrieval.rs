//! Retry/backoff behaviour against a scripted source, on paused tokio time.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use forecaster::{
    FetchOutcome, GribSource, RetrievalController, RetrievalError, RetrievalRequest,
    RetrievalStats, RetryPolicy,
};
use met_common::ForecastCycle;
use test_utils::stations;
use tokio::time::Instant;

/// Plays back outcomes in order, then repeats `fallback` forever.
struct ScriptedSource {
    script: Mutex<VecDeque<FetchOutcome>>,
    fallback: FetchOutcome,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    fn new(script: Vec<FetchOutcome>, fallback: FetchOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    fn gaps(&self) -> Vec<Duration> {
        self.calls().windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl GribSource for ScriptedSource {
    async fn fetch(&self, _request: &RetrievalRequest) -> FetchOutcome {
        self.calls.lock().unwrap().push(Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn status(code: u16) -> FetchOutcome {
    FetchOutcome::Status {
        code,
        has_location: false,
    }
}

fn body() -> FetchOutcome {
    FetchOutcome::Body(Bytes::from_static(b"GRIB payload"))
}

fn request() -> RetrievalRequest {
    let hour = ForecastCycle::parse("2020031618").unwrap().hour_at(37);
    RetrievalRequest::new(&stations::sma(), &hour)
}

fn policy(max_tries: u32) -> RetryPolicy {
    RetryPolicy {
        max_tries,
        ..RetryPolicy::default()
    }
}

fn within(gap: Duration, base_secs: u64) -> bool {
    let base = Duration::from_secs(base_secs);
    gap >= base && gap <= base + base / 3 + Duration::from_millis(5)
}

#[tokio::test(start_paused = true)]
async fn test_rate_limits_are_free() {
    // One try of budget: any charged failure would end the retrieval.
    let controller = RetrievalController::new(
        ScriptedSource::new(vec![status(403), status(403)], body()),
        policy(1),
    );
    let mut stats = RetrievalStats::default();

    let payload = controller.fetch(&request(), &mut stats).await.unwrap();
    assert_eq!(payload, Bytes::from_static(b"GRIB payload"));

    let source = controller.source();
    assert_eq!(source.calls().len(), 3);
    assert!(source.gaps().iter().all(|&gap| within(gap, 60)));
    assert_eq!(stats.free_retries, 2);
    assert_eq!(stats.status_count(403), 2);
    assert_eq!(stats.status_count(200), 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_cost_a_fifth() {
    let controller = RetrievalController::new(ScriptedSource::new(vec![], status(502)), policy(8));
    let mut stats = RetrievalStats::default();

    let err = controller.fetch(&request(), &mut stats).await.unwrap_err();
    match err {
        RetrievalError::Exhausted { attempts, file, .. } => {
            assert_eq!(attempts, 40);
            assert_eq!(file, "gfs.t18z.pgrb2.0p25.f037");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.source().calls().len(), 8 * 5);
    assert_eq!(stats.exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_failures_cost_a_try() {
    let controller = RetrievalController::new(ScriptedSource::new(vec![], status(400)), policy(8));
    let mut stats = RetrievalStats::default();

    assert!(controller.fetch(&request(), &mut stats).await.is_err());
    assert_eq!(controller.source().calls().len(), 8);
    assert_eq!(stats.free_retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_sleep_after_giving_up() {
    let controller = RetrievalController::new(ScriptedSource::new(vec![], status(400)), policy(1));
    let mut stats = RetrievalStats::default();
    let start = Instant::now();

    assert!(controller.fetch(&request(), &mut stats).await.is_err());
    assert_eq!(controller.source().calls().len(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_unpublished_data() {
    let waiting = RetryPolicy {
        wait: true,
        ..policy(1)
    };
    let script = vec![
        status(404),
        status(404),
        FetchOutcome::ConnectFailed("connection refused".to_string()),
    ];
    let controller = RetrievalController::new(ScriptedSource::new(script, body()), waiting);
    let mut stats = RetrievalStats::default();

    assert!(controller.fetch(&request(), &mut stats).await.is_ok());
    let gaps = controller.source().gaps();
    assert_eq!(gaps.len(), 3);
    assert!(within(gaps[0], 300));
    assert!(within(gaps[1], 300));
    assert!(within(gaps[2], 60));
    assert_eq!(stats.free_retries, 3);
    assert_eq!(stats.connect_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_404_without_wait_is_charged() {
    let controller =
        RetrievalController::new(ScriptedSource::new(vec![status(404)], body()), policy(1));
    let mut stats = RetrievalStats::default();

    assert!(controller.fetch(&request(), &mut stats).await.is_err());
    assert_eq!(controller.source().calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mixed_failures_spend_budget_exactly() {
    // 2 tries: five 500s (one try) plus one empty body (one try)
    let script = vec![
        status(500),
        status(500),
        status(429),
        status(500),
        status(500),
        status(500),
        FetchOutcome::Body(Bytes::new()),
    ];
    let controller = RetrievalController::new(ScriptedSource::new(script, body()), policy(2));
    let mut stats = RetrievalStats::default();

    assert!(controller.fetch(&request(), &mut stats).await.is_err());
    assert_eq!(controller.source().calls().len(), 7);
    assert_eq!(stats.empty_bodies, 1);
    assert_eq!(stats.free_retries, 1);
}
