#![forbid(unsafe_code)]

mod aggregator;
mod api;
mod config;
mod error;
mod gate;
mod iteration;
mod poller;
mod progress;
mod run;
mod scenario;
mod summary;
mod thresholds;
mod vu;

pub use aggregator::Aggregator;
pub use api::{ApiFuture, CallError, CallResult, HttpOcrApi, JobId, OcrApi};
pub use config::{
    ApiGeneration, RunConfig, RunMode, RunOptions, Target, run_config_from_options,
    thresholds_from_options,
};
pub use error::{Error, Result};
pub use iteration::{Endpoint, FailureReason, IterationOutcome, IterationResult, RequestSample};
pub use poller::{PollOutcome, PollSpec, poll};
pub use progress::{LiveMetrics, ProgressFn, ProgressUpdate};
pub use run::run;
pub use scenario::ScenarioKind;
pub use summary::RunSummary;
pub use thresholds::{
    ThresholdMetric, ThresholdSet, ThresholdVerdict, all_passed, default_thresholds,
    evaluate_thresholds, parse_threshold_expr, validate_thresholds,
};

pub use ocrload_http::{HttpClient, HttpTransportErrorKind};
pub use ocrload_metrics::{LiveQuantiles, RateSummary, TrendSummary};
