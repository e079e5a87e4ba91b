use std::fmt::Write as _;

use ocrload_core::{RunSummary, ThresholdVerdict, TrendSummary};

use super::format::*;

pub(crate) fn render(summary: &RunSummary, verdicts: &[ThresholdVerdict]) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(&mut out, "scenario: {}", summary.scenario).ok();
    writeln!(
        &mut out,
        "  vus: {} elapsed: {}",
        summary.concurrency,
        format_duration(summary.elapsed)
    )
    .ok();
    writeln!(
        &mut out,
        "  iterations: {} (failed {}, timed out {}) error_rate={} iters/s={}",
        summary.total_iterations,
        summary.failed_iterations,
        summary.timed_out_iterations,
        format_percent(summary.iteration_failed.rate),
        format_rate(summary.iterations_per_sec())
    )
    .ok();
    writeln!(
        &mut out,
        "  requests: {} (failed {})",
        summary.requests.total, summary.requests.hits
    )
    .ok();

    render_trend("iteration_duration", &summary.iteration_duration, &mut out);
    render_trend("http_req_duration", &summary.request_duration, &mut out);

    if !summary.outcomes.is_empty() {
        out.push_str("  outcomes\n");

        let mut outcomes: Vec<_> = summary.outcomes.iter().collect();
        outcomes.sort_by(|(a_label, a_count), (b_label, b_count)| {
            b_count.cmp(a_count).then_with(|| a_label.cmp(b_label))
        });
        for (label, count) in outcomes {
            writeln!(&mut out, "    {label}: {count}").ok();
        }
    }

    if !verdicts.is_empty() {
        out.push_str("\nthresholds\n");
        for v in verdicts {
            let mark = if v.passed { '✓' } else { '✗' };
            match v.observed {
                Some(obs) => writeln!(
                    &mut out,
                    "  {mark} {}: {} (observed {obs:.2})",
                    v.metric, v.expression
                ),
                None => writeln!(&mut out, "  {mark} {}: {} (no data)", v.metric, v.expression),
            }
            .ok();
        }
    }

    out
}

fn render_trend(name: &str, trend: &TrendSummary, out: &mut String) {
    if trend.is_empty() {
        writeln!(out, "  {name}: n/a").ok();
        return;
    }

    writeln!(
        out,
        "  {name} = avg={} min={} p50={} p90={} p95={} p99={} max={} (n={})",
        format_ms_opt(trend.avg()),
        format_ms_opt(trend.min()),
        format_ms_opt(trend.percentile(50.0)),
        format_ms_opt(trend.percentile(90.0)),
        format_ms_opt(trend.percentile(95.0)),
        format_ms_opt(trend.percentile(99.0)),
        format_ms_opt(trend.max()),
        trend.count()
    )
    .ok();
}
