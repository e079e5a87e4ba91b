use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ocrload_metrics::{Counter, Rate, Tally, Trend};

use crate::iteration::{IterationOutcome, IterationResult};
use crate::progress::LiveMetrics;
use crate::summary::RunSummary;

/// The only structure shared between virtual users.
///
/// `report` takes `&self` and may be called from any number of tasks at once; every sample lands
/// in an append-only set behind a lock or in an atomic counter.
#[derive(Debug, Default)]
pub struct Aggregator {
    iteration_failed: Rate,
    timed_out: Counter,
    iteration_duration: Trend,
    request_duration: Trend,
    requests: Rate,
    outcomes: Tally,
    active_vus: AtomicU64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, result: IterationResult) {
        let label = result.label();

        self.request_duration
            .record_many(result.sampled_latencies.iter().map(|s| s.latency));
        for sample in &result.sampled_latencies {
            self.requests.observe(!sample.ok);
        }

        self.iteration_duration.record(result.elapsed);
        if matches!(result.outcome, IterationOutcome::Timeout) {
            self.timed_out.increment(1);
        }
        self.outcomes.increment(&label);
        self.iteration_failed.observe(!result.outcome.is_success());
    }

    pub(crate) fn vu_started(&self) {
        self.active_vus.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn vu_finished(&self) {
        self.active_vus.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LiveMetrics {
        let iterations = self.iteration_failed.summary();
        let requests = self.requests.summary();

        LiveMetrics {
            iterations_total: iterations.total,
            failed_iterations_total: iterations.hits,
            iterations_per_sec_now: 0.0,
            requests_total: requests.total,
            failed_requests_total: requests.hits,
            iteration_duration: self.iteration_duration.live(),
            request_duration: self.request_duration.live(),
            active_vus: self.active_vus.load(Ordering::Relaxed),
            outcomes: self.outcomes.snapshot(),
        }
    }

    /// Consumes the aggregator; callers must hold the only reference, i.e. every reporter is done.
    pub fn finalize(self, scenario: &str, concurrency: u64, elapsed: Duration) -> RunSummary {
        let iteration_failed = self.iteration_failed.summary();

        RunSummary {
            scenario: scenario.to_string(),
            concurrency,
            elapsed,
            total_iterations: iteration_failed.total,
            failed_iterations: iteration_failed.hits,
            timed_out_iterations: self.timed_out.get(),
            iteration_failed,
            iteration_duration: self.iteration_duration.into_summary(),
            request_duration: self.request_duration.into_summary(),
            requests: self.requests.summary(),
            outcomes: self.outcomes.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::{Endpoint, FailureReason, RequestSample};
    use crate::poller::PollOutcome;
    use std::sync::Arc;

    fn done(elapsed_ms: u64) -> IterationResult {
        IterationResult {
            outcome: IterationOutcome::Success,
            elapsed: Duration::from_millis(elapsed_ms),
            sampled_latencies: vec![
                RequestSample {
                    endpoint: Endpoint::CreateJob,
                    latency: Duration::from_millis(5),
                    ok: true,
                },
                RequestSample {
                    endpoint: Endpoint::JobStatus,
                    latency: Duration::from_millis(7),
                    ok: true,
                },
            ],
            poll_outcome: Some(PollOutcome::Done),
        }
    }

    fn sync_503() -> IterationResult {
        IterationResult {
            outcome: IterationOutcome::Failure(FailureReason::Protocol {
                endpoint: Endpoint::Sync,
                status: 503,
            }),
            elapsed: Duration::from_millis(3),
            sampled_latencies: vec![RequestSample {
                endpoint: Endpoint::Sync,
                latency: Duration::from_millis(3),
                ok: false,
            }],
            poll_outcome: None,
        }
    }

    #[test]
    fn finalize_reflects_every_report() {
        let agg = Aggregator::new();
        agg.report(done(100));
        agg.report(sync_503());
        agg.report(IterationResult {
            outcome: IterationOutcome::Timeout,
            elapsed: Duration::from_secs(71),
            sampled_latencies: Vec::new(),
            poll_outcome: Some(PollOutcome::Timeout),
        });

        let summary = agg.finalize("create_and_poll", 1, Duration::from_secs(72));
        assert_eq!(summary.total_iterations, 3);
        assert_eq!(summary.failed_iterations, 2);
        assert_eq!(summary.timed_out_iterations, 1);
        assert_eq!(summary.requests.total, 3);
        assert_eq!(summary.requests.hits, 1);
        assert_eq!(summary.iteration_duration.count(), 3);
        assert_eq!(summary.request_duration.count(), 3);
        assert_eq!(summary.outcomes.get("DONE"), Some(&1));
        assert_eq!(summary.outcomes.get("HTTP_503"), Some(&1));
        assert_eq!(summary.outcomes.get("TIMEOUT"), Some(&1));
    }

    #[test]
    fn concurrent_reports_are_neither_lost_nor_duplicated() {
        let agg = Arc::new(Aggregator::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        if (t + i) % 10 == 0 {
                            agg.report(sync_503());
                        } else {
                            agg.report(done(i));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap_or_else(|_| panic!("reporter panicked"));
        }

        let agg = Arc::try_unwrap(agg).unwrap_or_else(|_| panic!("aggregator still shared"));
        let summary = agg.finalize("create_and_poll", 8, Duration::from_secs(1));

        assert_eq!(summary.total_iterations, 4000);
        assert_eq!(summary.failed_iterations, 400);
        assert_eq!(summary.iteration_duration.count(), 4000);
        assert_eq!(summary.request_duration.count(), 3600 * 2 + 400);
        assert_eq!(summary.outcomes.values().sum::<u64>(), 4000);
    }

    #[test]
    fn snapshot_tracks_active_vus() {
        let agg = Aggregator::new();
        agg.vu_started();
        agg.vu_started();
        agg.vu_finished();
        agg.report(done(10));

        let live = agg.snapshot();
        assert_eq!(live.active_vus, 1);
        assert_eq!(live.iterations_total, 1);
        assert_eq!(live.iteration_duration.count, 1);
    }
}
