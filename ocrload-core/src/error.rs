use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`request_timeout` must be a positive duration")]
    InvalidRequestTimeout,

    #[error("`poll_deadline` must be a positive duration")]
    InvalidPollDeadline,

    #[error(
        "`request_timeout` ({request_timeout:?}) must be shorter than `poll_deadline` ({poll_deadline:?})"
    )]
    RequestTimeoutNotBelowPollDeadline {
        request_timeout: Duration,
        poll_deadline: Duration,
    },

    #[error("invalid base url (expected http:// or https://): `{0}`")]
    InvalidBaseUrl(String),

    #[error("unknown threshold metric `{0}` (expected iteration_duration, iteration_failed, http_req_duration or http_req_failed)")]
    UnknownThresholdMetric(String),

    #[error("invalid threshold expression for metric `{metric}`: {error}")]
    InvalidThreshold { metric: String, error: String },

    #[error("metrics aggregator is still shared after all virtual users finished")]
    AggregatorShared,
}
