use std::collections::BTreeMap;
use std::time::Duration;

use ocrload_metrics::LiveQuantiles;

use crate::config::RunMode;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMetrics {
    /// Iterations completed so far.
    pub iterations_total: u64,
    pub failed_iterations_total: u64,

    /// Iterations/sec observed during the last progress interval.
    pub iterations_per_sec_now: f64,

    pub requests_total: u64,
    pub failed_requests_total: u64,

    /// Approximate quantiles (HDR histogram) over the run so far.
    pub iteration_duration: LiveQuantiles,
    pub request_duration: LiveQuantiles,

    pub active_vus: u64,
    pub outcomes: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    pub scenario: String,
    pub concurrency: u64,
    pub mode: RunMode,
    pub metrics: LiveMetrics,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
