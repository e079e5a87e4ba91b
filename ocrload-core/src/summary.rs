use std::collections::BTreeMap;
use std::time::Duration;

use ocrload_metrics::{RateSummary, TrendSummary};

/// Final statistics of a run, produced once after every virtual user finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub scenario: String,
    pub concurrency: u64,
    pub elapsed: Duration,

    pub total_iterations: u64,
    pub failed_iterations: u64,
    /// Subset of `failed_iterations` that hit the poll deadline.
    pub timed_out_iterations: u64,
    pub iteration_failed: RateSummary,

    /// End-to-end iteration latency, milliseconds.
    pub iteration_duration: TrendSummary,
    /// Per-HTTP-call latency, milliseconds.
    pub request_duration: TrendSummary,
    /// Hits are failed HTTP calls.
    pub requests: RateSummary,

    /// Iterations per outcome label (`DONE`, `TIMEOUT`, `HTTP_ERROR`, `HTTP_503`, ...).
    pub outcomes: BTreeMap<String, u64>,
}

impl RunSummary {
    /// Failed iterations over total iterations; 0 when nothing ran.
    pub fn error_rate(&self) -> f64 {
        self.iteration_failed.rate.unwrap_or(0.0)
    }

    pub fn iterations_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_iterations as f64 / secs
        } else {
            0.0
        }
    }
}
