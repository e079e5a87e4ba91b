use tokio::time::Instant;

use crate::config::RunMode;

/// Decides whether a virtual user may start another iteration.
///
/// Owned by a single VU: iteration counting and the wall-clock limit are both relative to that
/// VU's own start, so no state is shared across VUs.
#[derive(Debug)]
pub struct IterationGate {
    mode: RunMode,
    started: Instant,
    started_iterations: u64,
}

impl IterationGate {
    pub fn new(mode: RunMode, started: Instant) -> Self {
        Self {
            mode,
            started,
            started_iterations: 0,
        }
    }

    /// Claims the next iteration. Only checked between iterations; an iteration already running is
    /// never interrupted by the gate.
    pub fn next(&mut self) -> bool {
        if let RunMode::FixedIterations { count, .. } = self.mode
            && self.started_iterations >= count
        {
            return false;
        }

        if let Some(limit) = self.mode.wall_clock_limit()
            && self.started.elapsed() >= limit
        {
            return false;
        }

        self.started_iterations += 1;
        true
    }

    pub fn started_iterations(&self) -> u64 {
        self.started_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn fixed_iterations_stop_at_count() {
        let mut gate = IterationGate::new(
            RunMode::FixedIterations {
                count: 3,
                max_duration: None,
            },
            Instant::now(),
        );

        assert!(gate.next());
        assert!(gate.next());
        assert!(gate.next());
        assert!(!gate.next());
        assert!(!gate.next());
        assert_eq!(gate.started_iterations(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_mode_stops_once_span_elapsed() {
        let mut gate = IterationGate::new(RunMode::Duration(Duration::from_secs(2)), Instant::now());

        assert!(gate.next());
        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(gate.next());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!gate.next());
        assert_eq!(gate.started_iterations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn max_duration_caps_fixed_iterations() {
        let mut gate = IterationGate::new(
            RunMode::FixedIterations {
                count: 100,
                max_duration: Some(Duration::from_secs(1)),
            },
            Instant::now(),
        );

        assert!(gate.next());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!gate.next());
    }
}
