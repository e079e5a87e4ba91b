use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::percentile::percentile_linear;

/// Latency series.
///
/// Every sample is kept (microsecond resolution) so the end-of-run percentiles are exact and
/// reproducible. An HDR histogram is maintained alongside for cheap live quantiles while the
/// run is in progress.
#[derive(Debug)]
pub struct Trend {
    samples: Mutex<Vec<u64>>,
    histogram: Mutex<Histogram<u64>>,
}

impl Default for Trend {
    fn default() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            histogram: Mutex::new(new_default_histogram()),
        }
    }
}

fn new_default_histogram() -> Histogram<u64> {
    // Microseconds, up to one hour.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

#[inline]
fn micros(d: Duration) -> u64 {
    d.as_micros().try_into().unwrap_or(u64::MAX)
}

/// Quantiles from the live histogram, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveQuantiles {
    pub count: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl Trend {
    pub fn record(&self, d: Duration) {
        self.record_many(std::iter::once(d));
    }

    /// Records a batch while holding each lock once.
    pub fn record_many(&self, durations: impl IntoIterator<Item = Duration>) {
        let batch: Vec<u64> = durations.into_iter().map(micros).collect();
        if batch.is_empty() {
            return;
        }

        {
            let mut h = self.histogram.lock();
            for us in &batch {
                h.saturating_record((*us).max(1));
            }
        }

        self.samples.lock().extend(batch);
    }

    pub fn live(&self) -> LiveQuantiles {
        let h = self.histogram.lock();
        let count = h.len();
        let ms = |us: u64| us as f64 / 1000.0;

        LiveQuantiles {
            count,
            p50_ms: (count > 0).then(|| ms(h.value_at_quantile(0.50))),
            p95_ms: (count > 0).then(|| ms(h.value_at_quantile(0.95))),
            p99_ms: (count > 0).then(|| ms(h.value_at_quantile(0.99))),
            max_ms: (count > 0).then(|| ms(h.max())),
        }
    }

    pub fn into_summary(self) -> TrendSummary {
        TrendSummary::from_micros(self.samples.into_inner())
    }
}

/// Final distribution of a latency series, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendSummary {
    sorted_ms: Vec<f64>,
}

impl TrendSummary {
    pub fn from_micros(mut samples: Vec<u64>) -> Self {
        samples.sort_unstable();
        Self {
            sorted_ms: samples.into_iter().map(|us| us as f64 / 1000.0).collect(),
        }
    }

    pub fn from_millis(samples: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted_ms: Vec<f64> = samples.into_iter().filter(|v| v.is_finite()).collect();
        sorted_ms.sort_unstable_by(f64::total_cmp);
        Self { sorted_ms }
    }

    pub fn count(&self) -> u64 {
        self.sorted_ms.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_ms.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted_ms.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted_ms.last().copied()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.sorted_ms.is_empty() {
            return None;
        }
        Some(self.sorted_ms.iter().sum::<f64>() / self.sorted_ms.len() as f64)
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile_linear(&self.sorted_ms, p)
    }

    pub fn samples_ms(&self) -> &[f64] {
        &self.sorted_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn summary_is_exact_and_sorted() {
        let t = Trend::default();
        t.record_many([
            Duration::from_millis(30),
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]);

        let s = t.into_summary();
        assert_eq!(s.count(), 3);
        assert_eq!(s.samples_ms(), &[10.0, 20.0, 30.0]);
        assert_eq!(s.min(), Some(10.0));
        assert_eq!(s.max(), Some(30.0));
        assert_eq!(s.avg(), Some(20.0));
        assert_eq!(s.percentile(50.0), Some(20.0));
    }

    #[test]
    fn empty_summary_has_no_statistics() {
        let s = Trend::default().into_summary();
        assert!(s.is_empty());
        assert_eq!(s.avg(), None);
        assert_eq!(s.percentile(95.0), None);
    }

    #[test]
    fn live_quantiles_track_recorded_samples() {
        let t = Trend::default();
        assert_eq!(t.live().count, 0);
        assert_eq!(t.live().p95_ms, None);

        t.record(Duration::from_millis(250));
        let live = t.live();
        assert_eq!(live.count, 1);
        let p50 = live.p50_ms.unwrap_or_else(|| panic!("expected p50"));
        // HDR histogram with 3 significant digits.
        assert!((p50 - 250.0).abs() < 1.0, "p50={p50}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recording_keeps_every_sample() {
        let t = Arc::new(Trend::default());
        let mut handles = Vec::new();
        for vu in 0..16u64 {
            let t = t.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..250u64 {
                    t.record(Duration::from_micros(vu * 1000 + i + 1));
                }
            }));
        }
        for h in handles {
            h.await.unwrap_or_else(|e| panic!("{e}"));
        }

        let t = Arc::try_unwrap(t).unwrap_or_else(|_| panic!("trend still shared"));
        assert_eq!(t.live().count, 16 * 250);
        assert_eq!(t.into_summary().count(), 16 * 250);
    }
}
