//! Observational counters for a run.
//!
//! Counters only ever grow. They are owned by the caller and passed down by
//! `&mut`; every increment is also mirrored to the `metrics` facade so a
//! Prometheus exporter, when installed, sees the same events.

use std::collections::BTreeMap;

use metrics::counter;
use serde::Serialize;
use tracing::info;

/// Retrieval outcomes across every request of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrievalStats {
    pub requests: u64,
    /// HTTP status code -> responses seen
    pub statuses: BTreeMap<u16, u64>,
    pub connect_errors: u64,
    pub read_timeouts: u64,
    pub truncated: u64,
    pub transport_errors: u64,
    pub empty_bodies: u64,
    /// Retries that did not consume budget
    pub free_retries: u64,
    pub exhausted: u64,
    pub bytes: u64,
}

impl RetrievalStats {
    pub fn record_status(&mut self, status: u16) {
        self.requests += 1;
        *self.statuses.entry(status).or_default() += 1;
        counter!("forecaster_retrieval_responses_total", "status" => status.to_string())
            .increment(1);
    }

    pub fn record_bytes(&mut self, bytes: usize) {
        self.bytes += bytes as u64;
        counter!("forecaster_retrieval_bytes_total").increment(bytes as u64);
    }

    pub fn record_empty_body(&mut self) {
        self.empty_bodies += 1;
        counter!("forecaster_retrieval_errors_total", "kind" => "empty_body").increment(1);
    }

    pub fn record_connect_error(&mut self) {
        self.requests += 1;
        self.connect_errors += 1;
        counter!("forecaster_retrieval_errors_total", "kind" => "connect").increment(1);
    }

    pub fn record_read_timeout(&mut self) {
        self.requests += 1;
        self.read_timeouts += 1;
        counter!("forecaster_retrieval_errors_total", "kind" => "read_timeout").increment(1);
    }

    pub fn record_truncated(&mut self) {
        self.requests += 1;
        self.truncated += 1;
        counter!("forecaster_retrieval_errors_total", "kind" => "truncated").increment(1);
    }

    pub fn record_transport_error(&mut self) {
        self.requests += 1;
        self.transport_errors += 1;
        counter!("forecaster_retrieval_errors_total", "kind" => "transport").increment(1);
    }

    pub fn record_free_retry(&mut self) {
        self.free_retries += 1;
        counter!("forecaster_retrieval_free_retries_total").increment(1);
    }

    pub fn record_exhausted(&mut self) {
        self.exhausted += 1;
        counter!("forecaster_retrieval_exhausted_total").increment(1);
    }

    pub fn status_count(&self, status: u16) -> u64 {
        self.statuses.get(&status).copied().unwrap_or(0)
    }
}

/// Whole-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub retrieval: RetrievalStats,
    pub hours_emitted: u64,
    /// Failure stage -> hours skipped
    pub hours_skipped: BTreeMap<&'static str, u64>,
    /// Optional profile fields replaced by their default
    pub defaulted_fields: u64,
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    /// Output already complete, not recomputed
    pub cycles_existing: u64,
}

impl RunStats {
    pub fn record_emitted(&mut self) {
        self.hours_emitted += 1;
        counter!("forecaster_hours_emitted_total").increment(1);
    }

    pub fn record_skipped(&mut self, stage: &'static str) {
        *self.hours_skipped.entry(stage).or_default() += 1;
        counter!("forecaster_hours_skipped_total", "stage" => stage).increment(1);
    }

    pub fn record_defaulted(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.defaulted_fields += count as u64;
        counter!("forecaster_defaulted_fields_total").increment(count as u64);
    }

    pub fn record_cycle_completed(&mut self) {
        self.cycles_completed += 1;
        counter!("forecaster_cycles_total", "outcome" => "completed").increment(1);
    }

    pub fn record_cycle_aborted(&mut self) {
        self.cycles_aborted += 1;
        counter!("forecaster_cycles_total", "outcome" => "aborted").increment(1);
    }

    pub fn record_cycle_existing(&mut self) {
        self.cycles_existing += 1;
        counter!("forecaster_cycles_total", "outcome" => "existing").increment(1);
    }

    pub fn hours_skipped_total(&self) -> u64 {
        self.hours_skipped.values().sum()
    }

    /// Log the counters at the end of a run.
    pub fn log_summary(&self) {
        let r = &self.retrieval;
        info!(
            cycles_completed = self.cycles_completed,
            cycles_aborted = self.cycles_aborted,
            cycles_existing = self.cycles_existing,
            hours_emitted = self.hours_emitted,
            hours_skipped = self.hours_skipped_total(),
            defaulted_fields = self.defaulted_fields,
            requests = r.requests,
            free_retries = r.free_retries,
            connect_errors = r.connect_errors,
            read_timeouts = r.read_timeouts,
            truncated = r.truncated,
            bytes = r.bytes,
            statuses = ?r.statuses,
            skipped_by_stage = ?self.hours_skipped,
            "Forecast run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tallies() {
        let mut stats = RetrievalStats::default();
        stats.record_status(200);
        stats.record_status(503);
        stats.record_status(503);
        stats.record_connect_error();
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.status_count(503), 2);
        assert_eq!(stats.status_count(404), 0);
        assert_eq!(stats.connect_errors, 1);
    }

    #[test]
    fn test_skips_by_stage() {
        let mut stats = RunStats::default();
        stats.record_skipped("engine");
        stats.record_skipped("engine");
        stats.record_skipped("profile");
        stats.record_defaulted(0);
        stats.record_defaulted(3);
        assert_eq!(stats.hours_skipped_total(), 3);
        assert_eq!(stats.hours_skipped["engine"], 2);
        assert_eq!(stats.defaulted_fields, 3);
    }

    #[test]
    fn test_serializes_for_logs() {
        let mut stats = RunStats::default();
        stats.retrieval.record_status(200);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["retrieval"]["statuses"]["200"], 1);
    }
}
