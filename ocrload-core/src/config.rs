use std::time::Duration;

use crate::error::{Error, Result};
use crate::poller::PollSpec;
use crate::scenario::ScenarioKind;
use crate::thresholds::{ThresholdSet, default_thresholds, validate_thresholds};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_DOCUMENT_REF: &str = "sample.pdf";
const DEFAULT_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(70);

/// OCR API generation under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiGeneration {
    /// Synchronous call, one iteration per VU.
    V0,
    /// Synchronous call under SLA thresholds.
    V2,
    /// Create a job, then poll its status.
    V3,
}

impl ApiGeneration {
    pub fn path_prefix(self) -> &'static str {
        match self {
            Self::V0 => "/api/v0",
            Self::V2 => "/api/v2",
            Self::V3 => "/api/v3",
        }
    }

    pub fn is_async(self) -> bool {
        matches!(self, Self::V3)
    }

    pub fn default_request_timeout(self) -> Duration {
        match self {
            Self::V0 | Self::V2 => Duration::from_secs(60),
            Self::V3 => Duration::from_secs(10),
        }
    }

    fn default_iterations(self) -> Option<u64> {
        matches!(self, Self::V0).then_some(1)
    }

    fn default_max_duration(self) -> Option<Duration> {
        matches!(self, Self::V0).then_some(Duration::from_secs(120))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Every VU runs exactly `count` iterations, unless `max_duration` elapses first.
    FixedIterations {
        count: u64,
        max_duration: Option<Duration>,
    },

    /// Every VU keeps starting iterations until the span has elapsed since it started.
    Duration(Duration),
}

impl RunMode {
    /// Upper bound on how long a VU keeps starting iterations, if any.
    pub fn wall_clock_limit(&self) -> Option<Duration> {
        match *self {
            Self::FixedIterations { max_duration, .. } => max_duration,
            Self::Duration(span) => Some(span),
        }
    }
}

/// Where requests go and what they carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub base_url: String,
    pub path_prefix: String,
    pub document_ref: String,
}

impl Target {
    pub fn new(
        base_url: impl Into<String>,
        path_prefix: impl Into<String>,
        document_ref: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            path_prefix: normalize_prefix(&path_prefix.into()),
            document_ref: document_ref.into(),
        }
    }

    /// `{base_url}{path_prefix}{path}`.
    pub fn endpoint(&self, path: &str) -> Result<url::Url> {
        let raw = format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.path_prefix,
            path
        );
        let url = url::Url::parse(&raw).map_err(|_| Error::InvalidBaseUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(url)
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub concurrency: u64,
    pub mode: RunMode,
    pub per_request_timeout: Duration,
    pub scenario: ScenarioKind,
    pub target: Target,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidVus);
        }

        match self.mode {
            RunMode::FixedIterations { count, max_duration } => {
                if count == 0 {
                    return Err(Error::InvalidIterations);
                }
                if max_duration.is_some_and(|d| d.is_zero()) {
                    return Err(Error::InvalidDuration);
                }
            }
            RunMode::Duration(span) => {
                if span.is_zero() {
                    return Err(Error::InvalidDuration);
                }
            }
        }

        if self.per_request_timeout.is_zero() {
            return Err(Error::InvalidRequestTimeout);
        }

        if let ScenarioKind::CreateAndPoll(poll) = &self.scenario {
            if poll.deadline.is_zero() {
                return Err(Error::InvalidPollDeadline);
            }
            if self.per_request_timeout >= poll.deadline {
                return Err(Error::RequestTimeoutNotBelowPollDeadline {
                    request_timeout: self.per_request_timeout,
                    poll_deadline: poll.deadline,
                });
            }
        }

        self.target.endpoint("/ocr")?;
        Ok(())
    }
}

/// Partially specified run options, as read from one configuration source.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub api: Option<ApiGeneration>,
    pub base_url: Option<String>,
    pub path_prefix: Option<String>,
    pub document_ref: Option<String>,

    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    /// Run duration; ignored when `iterations` resolves to a value.
    pub duration: Option<Duration>,

    pub request_timeout: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub poll_deadline: Option<Duration>,

    pub thresholds: Vec<ThresholdSet>,
}

/// Resolves the run shape. Values from `overrides` (CLI/env) win over `base` (config file),
/// which wins over the API generation preset.
pub fn run_config_from_options(base: &RunOptions, overrides: &RunOptions) -> Result<RunConfig> {
    let api = overrides.api.or(base.api).unwrap_or(ApiGeneration::V3);

    let concurrency = overrides.vus.or(base.vus).unwrap_or(1);

    let iterations = overrides
        .iterations
        .or(base.iterations)
        .or(api.default_iterations());

    // A duration only shapes duration mode; fixed-iteration runs are capped by the preset alone.
    let mode = match iterations {
        Some(count) => RunMode::FixedIterations {
            count,
            max_duration: api.default_max_duration(),
        },
        None => RunMode::Duration(
            overrides
                .duration
                .or(base.duration)
                .unwrap_or(DEFAULT_DURATION),
        ),
    };

    let per_request_timeout = overrides
        .request_timeout
        .or(base.request_timeout)
        .unwrap_or(api.default_request_timeout());

    let scenario = if api.is_async() {
        ScenarioKind::CreateAndPoll(PollSpec {
            interval: overrides
                .poll_interval
                .or(base.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            deadline: overrides
                .poll_deadline
                .or(base.poll_deadline)
                .unwrap_or(DEFAULT_POLL_DEADLINE),
        })
    } else {
        ScenarioKind::SyncCall
    };

    let target = Target::new(
        overrides
            .base_url
            .clone()
            .or_else(|| base.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        overrides
            .path_prefix
            .clone()
            .or_else(|| base.path_prefix.clone())
            .unwrap_or_else(|| api.path_prefix().to_string()),
        overrides
            .document_ref
            .clone()
            .or_else(|| base.document_ref.clone())
            .unwrap_or_else(|| DEFAULT_DOCUMENT_REF.to_string()),
    );

    let cfg = RunConfig {
        concurrency,
        mode,
        per_request_timeout,
        scenario,
        target,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Thresholds come from a single source: overrides if any, else the base, else the defaults.
pub fn thresholds_from_options(
    base: &RunOptions,
    overrides: &RunOptions,
) -> Result<Vec<ThresholdSet>> {
    let sets = if !overrides.thresholds.is_empty() {
        overrides.thresholds.clone()
    } else if !base.thresholds.is_empty() {
        base.thresholds.clone()
    } else {
        default_thresholds()
    };

    validate_thresholds(&sets)?;
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(base: RunOptions, overrides: RunOptions) -> RunConfig {
        run_config_from_options(&base, &overrides).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn defaults_follow_v3_preset() {
        let cfg = resolve(RunOptions::default(), RunOptions::default());
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.mode, RunMode::Duration(Duration::from_secs(30)));
        assert_eq!(cfg.per_request_timeout, Duration::from_secs(10));
        assert_eq!(
            cfg.scenario,
            ScenarioKind::CreateAndPoll(PollSpec {
                interval: Duration::from_secs(1),
                deadline: Duration::from_secs(70),
            })
        );
        assert_eq!(cfg.target.path_prefix, "/api/v3");
        assert_eq!(cfg.target.document_ref, "sample.pdf");
    }

    #[test]
    fn v0_runs_one_iteration_per_vu_with_a_cap() {
        let cfg = resolve(
            RunOptions::default(),
            RunOptions {
                api: Some(ApiGeneration::V0),
                vus: Some(5),
                ..RunOptions::default()
            },
        );
        assert_eq!(cfg.scenario, ScenarioKind::SyncCall);
        assert_eq!(
            cfg.mode,
            RunMode::FixedIterations {
                count: 1,
                max_duration: Some(Duration::from_secs(120)),
            }
        );
        assert_eq!(cfg.per_request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn overrides_win_over_base() {
        let base = RunOptions {
            api: Some(ApiGeneration::V2),
            vus: Some(2),
            iterations: Some(10),
            base_url: Some("http://file:1".to_string()),
            ..RunOptions::default()
        };
        let overrides = RunOptions {
            vus: Some(8),
            base_url: Some("http://cli:2".to_string()),
            ..RunOptions::default()
        };

        let cfg = resolve(base, overrides);
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.target.base_url, "http://cli:2");
        assert_eq!(cfg.target.path_prefix, "/api/v2");
        assert_eq!(
            cfg.mode,
            RunMode::FixedIterations {
                count: 10,
                max_duration: None
            }
        );
    }

    #[test]
    fn duration_is_ignored_when_iterations_are_set() {
        let cfg = resolve(
            RunOptions::default(),
            RunOptions {
                api: Some(ApiGeneration::V2),
                iterations: Some(100),
                duration: Some(Duration::from_secs(1)),
                ..RunOptions::default()
            },
        );
        assert_eq!(
            cfg.mode,
            RunMode::FixedIterations {
                count: 100,
                max_duration: None,
            }
        );

        let cfg = resolve(
            RunOptions {
                duration: Some(Duration::from_secs(5)),
                ..RunOptions::default()
            },
            RunOptions {
                api: Some(ApiGeneration::V0),
                iterations: Some(3),
                ..RunOptions::default()
            },
        );
        assert_eq!(
            cfg.mode,
            RunMode::FixedIterations {
                count: 3,
                max_duration: Some(Duration::from_secs(120)),
            }
        );
    }

    #[test]
    fn rejects_zero_vus_and_iterations() {
        let zero_vus = RunOptions {
            vus: Some(0),
            ..RunOptions::default()
        };
        assert!(matches!(
            run_config_from_options(&RunOptions::default(), &zero_vus),
            Err(Error::InvalidVus)
        ));

        let zero_iters = RunOptions {
            iterations: Some(0),
            ..RunOptions::default()
        };
        assert!(matches!(
            run_config_from_options(&RunOptions::default(), &zero_iters),
            Err(Error::InvalidIterations)
        ));
    }

    #[test]
    fn request_timeout_must_be_below_poll_deadline() {
        let opts = RunOptions {
            request_timeout: Some(Duration::from_secs(70)),
            ..RunOptions::default()
        };
        assert!(matches!(
            run_config_from_options(&RunOptions::default(), &opts),
            Err(Error::RequestTimeoutNotBelowPollDeadline { .. })
        ));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let opts = RunOptions {
            base_url: Some("ftp://ocr".to_string()),
            ..RunOptions::default()
        };
        assert!(matches!(
            run_config_from_options(&RunOptions::default(), &opts),
            Err(Error::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn path_prefix_is_normalized() {
        assert_eq!(Target::new("http://h", "api/v3/", "d").path_prefix, "/api/v3");
        assert_eq!(Target::new("http://h", "", "d").path_prefix, "");
        assert_eq!(Target::new("http://h", "/", "d").path_prefix, "");

        let endpoint = Target::new("http://h:1/", "", "d")
            .endpoint("/ocr/sync")
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(endpoint.as_str(), "http://h:1/ocr/sync");
    }

    #[test]
    fn api_generation_parses_case_insensitively() {
        assert_eq!("v3".parse::<ApiGeneration>().ok(), Some(ApiGeneration::V3));
        assert_eq!("V0".parse::<ApiGeneration>().ok(), Some(ApiGeneration::V0));
        assert!("v1".parse::<ApiGeneration>().is_err());
    }

    #[test]
    fn thresholds_default_when_no_source_sets_them() {
        let sets = thresholds_from_options(&RunOptions::default(), &RunOptions::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(sets, default_thresholds());
    }
}
