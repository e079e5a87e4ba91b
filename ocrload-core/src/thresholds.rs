use std::str::FromStr as _;

use ocrload_metrics::{RateSummary, TrendSummary};

use crate::error::{Error, Result};
use crate::summary::RunSummary;

/// Metrics a threshold can be set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdMetric {
    /// End-to-end iteration latency (ms).
    IterationDuration,
    /// Per-HTTP-call latency (ms).
    HttpReqDuration,
    /// Failed iterations / total iterations.
    IterationFailed,
    /// Failed HTTP calls / total HTTP calls.
    HttpReqFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdVerdict {
    pub metric: String,
    pub expression: String,
    /// `None` when the metric has no data or the aggregation does not apply to it.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// `iteration_duration: p(95)<60000` and `iteration_failed: rate==0`.
pub fn default_thresholds() -> Vec<ThresholdSet> {
    vec![
        ThresholdSet {
            metric: ThresholdMetric::IterationDuration.to_string(),
            expressions: vec!["p(95)<60000".to_string()],
        },
        ThresholdSet {
            metric: ThresholdMetric::IterationFailed.to_string(),
            expressions: vec!["rate==0".to_string()],
        },
    ]
}

pub fn parse_threshold_expr(raw: &str) -> std::result::Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    // Two-char operators first so `<=` is not read as `<`.
    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("invalid threshold (missing operator): {raw}"))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(format!("invalid threshold: {raw}"));
    }

    let agg = if left.eq_ignore_ascii_case("avg") {
        ThresholdAgg::Avg
    } else if left.eq_ignore_ascii_case("min") {
        ThresholdAgg::Min
    } else if left.eq_ignore_ascii_case("max") {
        ThresholdAgg::Max
    } else if left.eq_ignore_ascii_case("count") {
        ThresholdAgg::Count
    } else if left.eq_ignore_ascii_case("rate") {
        ThresholdAgg::Rate
    } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: u32 = inner
            .parse()
            .map_err(|_| format!("invalid percentile in threshold: {raw}"))?;
        if !(1..=100).contains(&p) {
            return Err(format!("percentile out of range in threshold: {raw}"));
        }
        ThresholdAgg::P(p)
    } else {
        return Err(format!("unknown aggregation `{left}` in threshold: {raw}"));
    };

    let value: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric value in threshold: {raw}"))?;

    Ok(ThresholdExpr { agg, op, value })
}

/// Rejects unknown metrics and unparsable expressions before a run starts.
pub fn validate_thresholds(sets: &[ThresholdSet]) -> Result<()> {
    for set in sets {
        ThresholdMetric::from_str(&set.metric)
            .map_err(|_| Error::UnknownThresholdMetric(set.metric.clone()))?;

        for expr in &set.expressions {
            parse_threshold_expr(expr).map_err(|error| Error::InvalidThreshold {
                metric: set.metric.clone(),
                error,
            })?;
        }
    }
    Ok(())
}

/// One verdict per expression, in configuration order.
pub fn evaluate_thresholds(
    thresholds: &[ThresholdSet],
    summary: &RunSummary,
) -> Result<Vec<ThresholdVerdict>> {
    let mut out = Vec::new();

    for set in thresholds {
        let metric = ThresholdMetric::from_str(&set.metric).ok();

        for expr_raw in &set.expressions {
            let expr = parse_threshold_expr(expr_raw).map_err(|error| Error::InvalidThreshold {
                metric: set.metric.clone(),
                error,
            })?;

            let observed = metric.and_then(|m| observed_value(summary, m, &expr.agg));
            let passed = observed
                .map(|v| compare(v, expr.op, expr.value))
                .unwrap_or(false);

            out.push(ThresholdVerdict {
                metric: set.metric.clone(),
                expression: expr_raw.clone(),
                observed,
                passed,
            });
        }
    }

    Ok(out)
}

pub fn all_passed(verdicts: &[ThresholdVerdict]) -> bool {
    verdicts.iter().all(|v| v.passed)
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
        ThresholdOp::Eq => left == right,
    }
}

fn observed_value(summary: &RunSummary, metric: ThresholdMetric, agg: &ThresholdAgg) -> Option<f64> {
    match metric {
        ThresholdMetric::IterationDuration => trend_value(&summary.iteration_duration, agg),
        ThresholdMetric::HttpReqDuration => trend_value(&summary.request_duration, agg),
        ThresholdMetric::IterationFailed => rate_value(&summary.iteration_failed, agg),
        ThresholdMetric::HttpReqFailed => rate_value(&summary.requests, agg),
    }
}

fn trend_value(trend: &TrendSummary, agg: &ThresholdAgg) -> Option<f64> {
    match agg {
        ThresholdAgg::Avg => trend.avg(),
        ThresholdAgg::Min => trend.min(),
        ThresholdAgg::Max => trend.max(),
        ThresholdAgg::Count => Some(trend.count() as f64),
        ThresholdAgg::P(p) => trend.percentile(f64::from(*p)),
        ThresholdAgg::Rate => None,
    }
}

fn rate_value(rate: &RateSummary, agg: &ThresholdAgg) -> Option<f64> {
    match agg {
        // An empty run has no failures; `rate==0` must hold for it.
        ThresholdAgg::Rate => Some(rate.rate.unwrap_or(0.0)),
        ThresholdAgg::Count => Some(rate.hits as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(latencies_ms: impl IntoIterator<Item = f64>, total: u64, failed: u64) -> RunSummary {
        RunSummary {
            total_iterations: total,
            failed_iterations: failed,
            iteration_failed: RateSummary::new(total, failed),
            iteration_duration: TrendSummary::from_millis(latencies_ms),
            ..RunSummary::default()
        }
    }

    fn ten_to_thousand() -> impl Iterator<Item = f64> {
        (1..=100).map(|i| f64::from(i) * 10.0)
    }

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  avg  <=  123  ").unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(expr.agg, ThresholdAgg::Avg));
        assert!(matches!(expr.op, ThresholdOp::Lte));
        assert_eq!(expr.value, 123.0);
    }

    #[test]
    fn parse_threshold_expr_rejects_out_of_range_percentiles() {
        let err = match parse_threshold_expr("p(101)<1") {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(err.contains("out of range"));
    }

    #[test]
    fn default_slo_passes_for_fast_clean_run() {
        let s = summary(ten_to_thousand(), 100, 0);
        assert_eq!(s.iteration_duration.percentile(95.0), Some(950.5));

        let verdicts = evaluate_thresholds(&default_thresholds(), &s).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(verdicts.len(), 2);
        assert!(all_passed(&verdicts));
        assert_eq!(verdicts[0].observed, Some(950.5));
        assert_eq!(verdicts[1].observed, Some(0.0));
    }

    #[test]
    fn default_slo_fails_on_a_single_failed_iteration() {
        let s = summary(ten_to_thousand(), 100, 1);
        let verdicts = evaluate_thresholds(&default_thresholds(), &s).unwrap_or_else(|e| panic!("{e}"));

        assert!(verdicts[0].passed);
        assert!(!verdicts[1].passed);
        assert_eq!(verdicts[1].observed, Some(0.01));
        assert!(!all_passed(&verdicts));
    }

    #[test]
    fn default_slo_fails_when_p95_reaches_the_bound() {
        let s = summary((1..=100).map(|i| f64::from(i) * 1000.0), 100, 0);
        let verdicts = evaluate_thresholds(&default_thresholds(), &s).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(verdicts[0].observed, Some(95050.0));
        assert!(!verdicts[0].passed);
        assert!(verdicts[1].passed);
    }

    #[test]
    fn latency_threshold_fails_without_samples() {
        let s = summary(std::iter::empty(), 0, 0);
        let verdicts = evaluate_thresholds(&default_thresholds(), &s).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(verdicts[0].observed, None);
        assert!(!verdicts[0].passed);
    }

    #[test]
    fn inapplicable_aggregation_is_a_failed_verdict() {
        let sets = vec![ThresholdSet {
            metric: "iteration_duration".to_string(),
            expressions: vec!["rate<1".to_string()],
        }];
        let verdicts =
            evaluate_thresholds(&sets, &summary(ten_to_thousand(), 100, 0)).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(verdicts[0].observed, None);
        assert!(!verdicts[0].passed);
    }

    #[test]
    fn validation_rejects_unknown_metrics_and_bad_expressions() {
        let unknown = vec![ThresholdSet {
            metric: "checks".to_string(),
            expressions: vec!["rate==1".to_string()],
        }];
        assert!(matches!(
            validate_thresholds(&unknown),
            Err(Error::UnknownThresholdMetric(m)) if m == "checks"
        ));

        let bad = vec![ThresholdSet {
            metric: "http_req_duration".to_string(),
            expressions: vec!["p(95)".to_string()],
        }];
        assert!(matches!(
            validate_thresholds(&bad),
            Err(Error::InvalidThreshold { .. })
        ));

        assert!(validate_thresholds(&default_thresholds()).is_ok());
    }

    #[test]
    fn http_req_failed_uses_request_rate() {
        let s = RunSummary {
            requests: RateSummary::new(4, 1),
            ..RunSummary::default()
        };
        let sets = vec![ThresholdSet {
            metric: "http_req_failed".to_string(),
            expressions: vec!["rate<0.5".to_string(), "count==1".to_string()],
        }];
        let verdicts = evaluate_thresholds(&sets, &s).unwrap_or_else(|e| panic!("{e}"));
        assert!(all_passed(&verdicts));
    }
}
