use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::aggregator::Aggregator;
use crate::api::{OcrApi, TimeoutApi};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::progress::{ProgressFn, ProgressUpdate};
use crate::summary::RunSummary;
use crate::vu::{StartSignal, VuContext, run_vu};

const PROGRESS_TICK: Duration = Duration::from_secs(1);

/// Runs `config.concurrency` virtual users against `api` and summarizes the run.
///
/// Every call into `api` is bounded by `config.per_request_timeout`; an expired call is a
/// transport timeout.
///
/// Failing iterations never abort the run. The only error paths are invalid configuration and a
/// VU task that panicked; in the latter case every other VU is still joined first.
pub async fn run(
    config: &RunConfig,
    api: Arc<dyn OcrApi>,
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    config.validate()?;

    let api: Arc<dyn OcrApi> = Arc::new(TimeoutApi::new(api, config.per_request_timeout));

    let aggregator = Arc::new(Aggregator::new());
    let start_signal = Arc::new(StartSignal::new());

    let mut handles = Vec::with_capacity(usize::try_from(config.concurrency).unwrap_or(0));
    for vu_id in 1..=config.concurrency {
        let ctx = VuContext {
            vu_id,
            scenario: config.scenario,
            mode: config.mode,
            api: api.clone(),
            aggregator: aggregator.clone(),
            start_signal: start_signal.clone(),
        };
        handles.push(tokio::spawn(run_vu(ctx)));
    }

    tracing::info!(
        vus = config.concurrency,
        scenario = config.scenario.name(),
        mode = ?config.mode,
        "starting run"
    );

    let started = Instant::now();
    start_signal.start();

    let progress_handle = progress.map(|progress| {
        let aggregator = aggregator.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(started + PROGRESS_TICK, PROGRESS_TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut tick: u64 = 0;
            let mut last_at = started;
            let mut last_iterations = 0u64;

            loop {
                interval.tick().await;

                tick = tick.saturating_add(1);
                let now = Instant::now();
                let dt = now.duration_since(last_at);
                last_at = now;

                let mut metrics = aggregator.snapshot();
                let delta = metrics.iterations_total.saturating_sub(last_iterations);
                last_iterations = metrics.iterations_total;
                metrics.iterations_per_sec_now = delta as f64 / dt.as_secs_f64().max(1e-9);

                progress(ProgressUpdate {
                    tick,
                    elapsed: started.elapsed(),
                    scenario: config.scenario.name().to_string(),
                    concurrency: config.concurrency,
                    mode: config.mode,
                    metrics,
                });
            }
        })
    });

    let mut attempted = 0u64;
    let mut first_err: Option<Error> = None;
    for h in handles {
        match h.await {
            Ok(n) => attempted = attempted.saturating_add(n),
            Err(err) => {
                tracing::error!(error = %err, "virtual user task failed");
                first_err.get_or_insert(Error::Join(err));
            }
        }
    }
    let elapsed = started.elapsed();

    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }

    if let Some(err) = first_err {
        return Err(err);
    }

    let aggregator = Arc::try_unwrap(aggregator).map_err(|_| Error::AggregatorShared)?;
    let summary = aggregator.finalize(config.scenario.name(), config.concurrency, elapsed);

    tracing::info!(
        iterations = summary.total_iterations,
        attempted,
        failed = summary.failed_iterations,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "run finished"
    );
    debug_assert_eq!(summary.total_iterations, attempted);

    Ok(summary)
}
