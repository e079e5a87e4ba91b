use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    #[inline]
    pub fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fraction of observations that were "hits" (for failure rates: hit == failed).
#[derive(Debug, Default)]
pub struct Rate {
    total: AtomicU64,
    hits: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSummary {
    pub total: u64,
    pub hits: u64,
    /// `None` when nothing was observed.
    pub rate: Option<f64>,
}

impl RateSummary {
    pub fn new(total: u64, hits: u64) -> Self {
        let rate = (total > 0).then(|| hits as f64 / total as f64);
        Self { total, hits, rate }
    }
}

impl Rate {
    #[inline]
    pub fn observe(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RateSummary {
        let total = self.total.load(Ordering::Relaxed);
        // The two counters move independently; a concurrent reader may see one hit early.
        let hits = self.hits.load(Ordering::Relaxed).min(total);
        RateSummary::new(total, hits)
    }
}
