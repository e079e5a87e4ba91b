use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::*;
use progress::HumanProgress;
use summary::render;

use ocrload_core::{RunConfig, RunMode, ScenarioKind, ThresholdSet};

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, config: &RunConfig, thresholds: &[ThresholdSet]) {
        println!(
            "target: {}{} document={}",
            config.target.base_url.trim_end_matches('/'),
            config.target.path_prefix,
            config.target.document_ref
        );

        let mode = match config.mode {
            RunMode::FixedIterations {
                count,
                max_duration: Some(cap),
            } => format!("iterations={count} max_duration={}", format_duration(cap)),
            RunMode::FixedIterations {
                count,
                max_duration: None,
            } => format!("iterations={count}"),
            RunMode::Duration(span) => format!("duration={}", format_duration(span)),
        };
        print!(
            "scenario: {} vus={} {mode} request_timeout={}",
            config.scenario.name(),
            config.concurrency,
            format_duration(config.per_request_timeout)
        );
        if let ScenarioKind::CreateAndPoll(poll) = config.scenario {
            print!(
                " poll_interval={} poll_deadline={}",
                format_duration(poll.interval),
                format_duration(poll.deadline)
            );
        }
        println!();

        for set in thresholds {
            println!("threshold: {} {}", set.metric, set.expressions.join(", "));
        }
        println!();
    }

    fn progress(&self) -> Option<ocrload_core::ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u: ocrload_core::ProgressUpdate| {
            let m = &u.metrics;
            let message = format!(
                "vus={}/{} elapsed={} iters={} iters/s={} failed={} p95={}",
                m.active_vus,
                u.concurrency,
                format_duration(u.elapsed),
                m.iterations_total,
                format_rate(m.iterations_per_sec_now),
                m.failed_iterations_total,
                format_ms_opt(m.iteration_duration.p95_ms)
            );

            progress.update(&u.scenario, u.mode.wall_clock_limit(), u.elapsed, message);
        }))
    }

    fn print_summary(
        &self,
        summary: &ocrload_core::RunSummary,
        verdicts: &[ocrload_core::ThresholdVerdict],
    ) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary, verdicts));

        let failed: Vec<_> = verdicts.iter().filter(|v| !v.passed).collect();
        if !failed.is_empty() {
            eprintln!("thresholds failed:");
            for v in failed {
                match v.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", v.metric, v.expression),
                    None => eprintln!("  {}: {} (no data)", v.metric, v.expression),
                }
            }
        }

        Ok(())
    }
}
