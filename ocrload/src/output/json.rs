use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use ocrload_core::{LiveQuantiles, RunConfig, RunSummary, ThresholdSet, ThresholdVerdict, TrendSummary};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _config: &RunConfig, _thresholds: &[ThresholdSet]) {}

    fn progress(&self) -> Option<ocrload_core::ProgressFn> {
        Some(Arc::new(move |u: ocrload_core::ProgressUpdate| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, summary: &RunSummary, verdicts: &[ThresholdVerdict]) -> anyhow::Result<()> {
        let line = build_summary_line(summary, verdicts);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub scenario: String,
    pub vus: u64,
    pub active_vus: u64,

    pub iterations_total: u64,
    pub failed_iterations_total: u64,
    pub iterations_per_sec: f64,
    pub requests_total: u64,
    pub failed_requests_total: u64,

    pub iteration_duration: JsonLiveQuantiles,
    pub http_req_duration: JsonLiveQuantiles,

    pub outcomes: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLiveQuantiles {
    pub count: u64,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub max: Option<f64>,
}

impl From<LiveQuantiles> for JsonLiveQuantiles {
    fn from(q: LiveQuantiles) -> Self {
        Self {
            count: q.count,
            p50: q.p50_ms,
            p95: q.p95_ms,
            p99: q.p99_ms,
            max: q.max_ms,
        }
    }
}

fn build_progress_line(u: &ocrload_core::ProgressUpdate) -> JsonProgressLine {
    let m = &u.metrics;
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        scenario: u.scenario.clone(),
        vus: u.concurrency,
        active_vus: m.active_vus,

        iterations_total: m.iterations_total,
        failed_iterations_total: m.failed_iterations_total,
        iterations_per_sec: m.iterations_per_sec_now,
        requests_total: m.requests_total,
        failed_requests_total: m.failed_requests_total,

        iteration_duration: m.iteration_duration.into(),
        http_req_duration: m.request_duration.into(),

        outcomes: m.outcomes.clone(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub scenario: String,
    pub vus: u64,
    pub elapsed_secs: f64,

    pub total_iterations: u64,
    pub failed_iterations: u64,
    pub timed_out_iterations: u64,
    pub error_rate: f64,
    pub iterations_per_sec: f64,

    pub requests_total: u64,
    pub failed_requests_total: u64,

    pub iteration_duration: Option<JsonTrendSummary>,
    pub http_req_duration: Option<JsonTrendSummary>,

    pub outcomes: BTreeMap<String, u64>,

    pub thresholds: Vec<JsonThresholdVerdict>,
    pub passed: bool,
}

/// Milliseconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonTrendSummary {
    pub count: u64,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl JsonTrendSummary {
    fn from_trend(t: &TrendSummary) -> Option<Self> {
        (!t.is_empty()).then(|| Self {
            count: t.count(),
            avg: t.avg(),
            min: t.min(),
            max: t.max(),
            p50: t.percentile(50.0),
            p90: t.percentile(90.0),
            p95: t.percentile(95.0),
            p99: t.percentile(99.0),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonThresholdVerdict {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

fn build_summary_line(summary: &RunSummary, verdicts: &[ThresholdVerdict]) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        scenario: summary.scenario.clone(),
        vus: summary.concurrency,
        elapsed_secs: summary.elapsed.as_secs_f64(),

        total_iterations: summary.total_iterations,
        failed_iterations: summary.failed_iterations,
        timed_out_iterations: summary.timed_out_iterations,
        error_rate: summary.error_rate(),
        iterations_per_sec: summary.iterations_per_sec(),

        requests_total: summary.requests.total,
        failed_requests_total: summary.requests.hits,

        iteration_duration: JsonTrendSummary::from_trend(&summary.iteration_duration),
        http_req_duration: JsonTrendSummary::from_trend(&summary.request_duration),

        outcomes: summary.outcomes.clone(),

        thresholds: verdicts
            .iter()
            .map(|v| JsonThresholdVerdict {
                metric: v.metric.clone(),
                expression: v.expression.clone(),
                observed: v.observed,
                passed: v.passed,
            })
            .collect(),
        passed: ocrload_core::all_passed(verdicts),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrload_core::{LiveMetrics, ProgressUpdate, RateSummary, RunMode};
    use serde_json::Value;
    use std::time::Duration;

    fn to_value<T: Serialize>(line: &T) -> Value {
        match serde_json::to_value(line) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        }
    }

    #[test]
    fn progress_line_has_kind_and_totals() {
        let update = ProgressUpdate {
            tick: 3,
            elapsed: Duration::from_secs(3),
            scenario: "sync_call".to_string(),
            concurrency: 4,
            mode: RunMode::Duration(Duration::from_secs(30)),
            metrics: LiveMetrics {
                iterations_total: 12,
                failed_iterations_total: 1,
                active_vus: 4,
                ..LiveMetrics::default()
            },
        };

        let v = to_value(&build_progress_line(&update));
        assert_eq!(v.get("kind").and_then(Value::as_str), Some("progress"));
        assert_eq!(v.get("tick").and_then(Value::as_u64), Some(3));
        assert_eq!(v.get("iterations_total").and_then(Value::as_u64), Some(12));
        assert_eq!(v.get("active_vus").and_then(Value::as_u64), Some(4));
        assert!(v.pointer("/iteration_duration/p95").is_some_and(Value::is_null));
    }

    #[test]
    fn summary_line_carries_verdicts() {
        let summary = RunSummary {
            scenario: "create_and_poll".to_string(),
            concurrency: 2,
            elapsed: Duration::from_secs(4),
            total_iterations: 8,
            failed_iterations: 0,
            iteration_failed: RateSummary::new(8, 0),
            iteration_duration: TrendSummary::from_millis([100.0, 200.0]),
            requests: RateSummary::new(32, 0),
            outcomes: [("DONE".to_string(), 8)].into_iter().collect(),
            ..RunSummary::default()
        };
        let verdicts = vec![ThresholdVerdict {
            metric: "iteration_failed".to_string(),
            expression: "rate==0".to_string(),
            observed: Some(0.0),
            passed: true,
        }];

        let v = to_value(&build_summary_line(&summary, &verdicts));
        assert_eq!(v.get("kind").and_then(Value::as_str), Some("summary"));
        assert_eq!(v.get("total_iterations").and_then(Value::as_u64), Some(8));
        assert_eq!(v.get("iterations_per_sec").and_then(Value::as_f64), Some(2.0));
        assert_eq!(v.get("requests_total").and_then(Value::as_u64), Some(32));
        assert_eq!(v.pointer("/outcomes/DONE").and_then(Value::as_u64), Some(8));
        assert_eq!(v.pointer("/iteration_duration/avg").and_then(Value::as_f64), Some(150.0));
        assert!(v.get("http_req_duration").is_some_and(Value::is_null));
        assert_eq!(
            v.pointer("/thresholds/0/expression").and_then(Value::as_str),
            Some("rate==0")
        );
        assert_eq!(v.get("passed").and_then(Value::as_bool), Some(true));
    }
}
