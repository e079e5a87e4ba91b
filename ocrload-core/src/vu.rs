use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::aggregator::Aggregator;
use crate::api::OcrApi;
use crate::config::RunMode;
use crate::gate::IterationGate;
use crate::scenario::ScenarioKind;

/// Releases every spawned VU at once.
#[derive(Debug, Default)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        while !self.started.load(Ordering::Acquire) {
            let notified = self.notify.notified();
            if self.started.load(Ordering::Acquire) {
                break;
            }
            notified.await;
        }
    }
}

#[derive(Clone)]
pub struct VuContext {
    pub vu_id: u64,
    pub scenario: ScenarioKind,
    pub mode: RunMode,
    pub api: Arc<dyn OcrApi>,
    pub aggregator: Arc<Aggregator>,
    pub start_signal: Arc<StartSignal>,
}

struct ActiveVuGuard<'a>(&'a Aggregator);

impl<'a> ActiveVuGuard<'a> {
    fn new(aggregator: &'a Aggregator) -> Self {
        aggregator.vu_started();
        Self(aggregator)
    }
}

impl Drop for ActiveVuGuard<'_> {
    fn drop(&mut self) {
        self.0.vu_finished();
    }
}

/// Runs one virtual user to completion and returns how many iterations it attempted.
///
/// Every attempted iteration is reported exactly once. Iterations run back to back; the gate is
/// consulted only between them, so an iteration in flight when the run's time is up still
/// completes and is reported.
pub async fn run_vu(ctx: VuContext) -> u64 {
    ctx.start_signal.wait().await;

    let _active = ActiveVuGuard::new(&ctx.aggregator);
    let mut gate = IterationGate::new(ctx.mode, Instant::now());

    while gate.next() {
        let result = ctx.scenario.execute(ctx.api.as_ref()).await;
        ctx.aggregator.report(result);
    }

    tracing::debug!(
        vu = ctx.vu_id,
        iterations = gate.started_iterations(),
        "virtual user finished"
    );
    gate.started_iterations()
}
