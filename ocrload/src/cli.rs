use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use ocrload_core::{ApiGeneration, RunOptions, ThresholdSet};

const DURATION_HINT: &str = "expected e.g. 10s, 250ms, 1m, or bare seconds like 0.5";

/// Durations as `250ms`, `10s`, `1.5m`; a bare number is seconds and may be fractional.
pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err(format!("duration cannot be empty ({DURATION_HINT})"));
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit() && *ch != '.')
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!("invalid duration '{s}' ({DURATION_HINT})"));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: f64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' ({DURATION_HINT})"))?;

    let secs_per_unit = match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1e-3,
        "us" | "usec" | "usecs" | "microsecond" | "microseconds" => 1e-6,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        _ => return Err(format!("invalid duration '{s}' ({DURATION_HINT})")),
    };

    Duration::try_from_secs_f64(value * secs_per_unit)
        .map_err(|_| format!("duration '{s}' is out of range"))
}

fn parse_api(input: &str) -> Result<ApiGeneration, String> {
    input
        .trim()
        .parse()
        .map_err(|_| format!("unknown api generation '{input}' (expected v0, v2 or v3)"))
}

/// `METRIC:EXPR`, e.g. `iteration_duration:p(95)<60000`.
fn parse_threshold(input: &str) -> Result<(String, String), String> {
    let (metric, expr) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid threshold '{input}' (expected METRIC:EXPR)"))?;
    let metric = metric.trim();
    let expr = expr.trim();
    if metric.is_empty() || expr.is_empty() {
        return Err(format!("invalid threshold '{input}' (expected METRIC:EXPR)"));
    }
    Ok((metric.to_string(), expr.to_string()))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "ocrload",
    author,
    version,
    about = "Load generator for document-OCR services",
    long_about = "ocrload drives concurrent virtual users against an OCR HTTP service and checks the results against service-level thresholds.\n\nThree API generations are supported: v0 and v2 submit documents synchronously, v3 creates a job and polls its status until it is DONE, fails, or the poll deadline passes.",
    after_help = "Examples:\n  ocrload run --api v0 --vus 10\n  ocrload run --api v2 --vus 20 --duration 1m\n  ocrload run --api v3 --vus 5 --iterations 10 --poll-interval 0.5\n  ocrload run --config load.yaml --output json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against an OCR service
    #[command(
        long_about = "Run virtual users against the OCR service.\n\nValues are resolved as: CLI flag, then environment variable, then --config file, then the API generation's preset."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// YAML run configuration
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// OCR API generation (v0, v2, v3)
    #[arg(long, env = "OCR_API", value_parser = parse_api)]
    pub api: Option<ApiGeneration>,

    /// Service base URL
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Path prefix in front of /ocr/... (defaults to /api/<generation>)
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Document reference sent with every request
    #[arg(long, env = "DOCUMENT_REF")]
    pub document_ref: Option<String>,

    /// Number of virtual users
    #[arg(long, env = "VUS")]
    pub vus: Option<u64>,

    /// Iterations per virtual user
    #[arg(long, env = "ITERATIONS")]
    pub iterations: Option<u64>,

    /// Run duration when no iteration count is set (e.g. 30s, 1m)
    #[arg(long, env = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Per-HTTP-call timeout
    #[arg(long, env = "REQUEST_TIMEOUT", value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Sleep between two status reads (v3)
    #[arg(long, env = "POLL_INTERVAL_SECONDS", value_parser = parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Wall-clock budget for polling one job (v3)
    #[arg(long, env = "MAX_POLL_SECONDS", value_parser = parse_duration)]
    pub poll_deadline: Option<Duration>,

    /// Threshold as METRIC:EXPR (repeatable), e.g. iteration_failed:rate==0
    #[arg(long = "threshold", value_name = "METRIC:EXPR", value_parser = parse_threshold)]
    pub thresholds: Vec<(String, String)>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Debug logging on stderr (OCRLOAD_LOG / RUST_LOG take precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    pub(crate) fn run_options(&self) -> RunOptions {
        RunOptions {
            api: self.api,
            base_url: self.base_url.clone(),
            path_prefix: self.path_prefix.clone(),
            document_ref: self.document_ref.clone(),
            vus: self.vus,
            iterations: self.iterations,
            duration: self.duration,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            poll_deadline: self.poll_deadline,
            thresholds: group_thresholds(&self.thresholds),
        }
    }
}

/// Groups repeated `--threshold` flags by metric, keeping first-seen order.
fn group_thresholds(flags: &[(String, String)]) -> Vec<ThresholdSet> {
    let mut sets: Vec<ThresholdSet> = Vec::new();
    for (metric, expr) in flags {
        match sets.iter_mut().find(|s| &s.metric == metric) {
            Some(set) => set.expressions.push(expr.clone()),
            None => sets.push(ThresholdSet {
                metric: metric.clone(),
                expressions: vec![expr.clone()],
            }),
        }
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(2 * 60 * 60)));
    }

    #[test]
    fn parse_duration_accepts_bare_fractional_seconds() {
        assert_eq!(parse_duration("70"), Ok(Duration::from_secs(70)));
        assert_eq!(parse_duration("0.5"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }

    #[test]
    fn parse_threshold_splits_on_first_colon() {
        assert_eq!(
            parse_threshold("iteration_duration: p(95)<60000"),
            Ok(("iteration_duration".to_string(), "p(95)<60000".to_string()))
        );
        assert!(parse_threshold("p(95)<60000").is_err());
        assert!(parse_threshold("iteration_failed:").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let parsed = Cli::try_parse_from([
            "ocrload",
            "run",
            "--api",
            "v3",
            "--vus",
            "4",
            "--iterations",
            "10",
            "--poll-interval",
            "0.5",
            "--poll-deadline",
            "70",
            "--threshold",
            "iteration_failed:rate==0",
            "--threshold",
            "http_req_duration:p(95)<500",
            "--threshold",
            "iteration_failed:count<1",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        let Command::Run(args) = cli.command;
        assert_eq!(args.api, Some(ApiGeneration::V3));
        assert_eq!(args.vus, Some(4));
        assert_eq!(args.iterations, Some(10));
        assert_eq!(args.poll_interval, Some(Duration::from_millis(500)));
        assert_eq!(args.poll_deadline, Some(Duration::from_secs(70)));
        assert!(matches!(args.output, OutputFormat::Json));

        let opts = args.run_options();
        assert_eq!(opts.thresholds.len(), 2);
        assert_eq!(opts.thresholds[0].metric, "iteration_failed");
        assert_eq!(opts.thresholds[0].expressions, vec!["rate==0", "count<1"]);
    }

    #[test]
    fn cli_rejects_unknown_api() {
        assert!(Cli::try_parse_from(["ocrload", "run", "--api", "v1"]).is_err());
    }
}
