use std::fmt;
use std::time::Duration;

use ocrload_http::HttpTransportErrorKind;

use crate::poller::PollOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    Sync,
    CreateJob,
    JobStatus,
}

/// One HTTP exchange within an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSample {
    pub endpoint: Endpoint,
    pub latency: Duration,
    /// HTTP 200 received.
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport {
        endpoint: Endpoint,
        kind: HttpTransportErrorKind,
    },
    Protocol {
        endpoint: Endpoint,
        status: u16,
    },
    MissingJobId,
    StatusReadFailed,
    JobFailed,
    UnexpectedStatus(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { endpoint, kind } => write!(f, "{endpoint}: transport error ({kind})"),
            Self::Protocol { endpoint, status } => write!(f, "{endpoint}: http status {status}"),
            Self::MissingJobId => f.write_str("create_job: response has no jobId"),
            Self::StatusReadFailed => f.write_str("job_status: read failed"),
            Self::JobFailed => f.write_str("job reported FAILED"),
            Self::UnexpectedStatus(status) => write!(f, "job ended with status `{status}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    Success,
    Failure(FailureReason),
    Timeout,
}

impl IterationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationResult {
    pub outcome: IterationOutcome,
    pub elapsed: Duration,
    pub sampled_latencies: Vec<RequestSample>,
    /// Set when the iteration reached the polling phase.
    pub poll_outcome: Option<PollOutcome>,
}

impl IterationResult {
    /// Diagnostic label. Poll outcomes keep the literal status the service returned.
    pub fn label(&self) -> String {
        if let Some(poll) = &self.poll_outcome {
            return poll.as_str().to_string();
        }

        match &self.outcome {
            IterationOutcome::Success => "SUCCESS".to_string(),
            IterationOutcome::Timeout => "TIMEOUT".to_string(),
            IterationOutcome::Failure(FailureReason::Transport { .. }) => {
                "TRANSPORT_ERROR".to_string()
            }
            IterationOutcome::Failure(FailureReason::Protocol { status, .. }) => {
                format!("HTTP_{status}")
            }
            IterationOutcome::Failure(FailureReason::MissingJobId) => "MISSING_JOB_ID".to_string(),
            IterationOutcome::Failure(FailureReason::StatusReadFailed) => "HTTP_ERROR".to_string(),
            IterationOutcome::Failure(FailureReason::JobFailed) => "FAILED".to_string(),
            IterationOutcome::Failure(FailureReason::UnexpectedStatus(s)) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: IterationOutcome, poll: Option<PollOutcome>) -> IterationResult {
        IterationResult {
            outcome,
            elapsed: Duration::ZERO,
            sampled_latencies: Vec::new(),
            poll_outcome: poll,
        }
    }

    #[test]
    fn labels_keep_poll_literals() {
        let r = result(
            IterationOutcome::Failure(FailureReason::UnexpectedStatus("CANCELLED".into())),
            Some(PollOutcome::Terminal("CANCELLED".into())),
        );
        assert_eq!(r.label(), "CANCELLED");

        let r = result(IterationOutcome::Success, Some(PollOutcome::Done));
        assert_eq!(r.label(), "DONE");
    }

    #[test]
    fn labels_describe_pre_poll_failures() {
        let r = result(
            IterationOutcome::Failure(FailureReason::Protocol {
                endpoint: Endpoint::Sync,
                status: 503,
            }),
            None,
        );
        assert_eq!(r.label(), "HTTP_503");

        let r = result(IterationOutcome::Failure(FailureReason::MissingJobId), None);
        assert_eq!(r.label(), "MISSING_JOB_ID");

        let r = result(IterationOutcome::Success, None);
        assert_eq!(r.label(), "SUCCESS");
    }

    #[test]
    fn endpoint_names_are_snake_case() {
        assert_eq!(Endpoint::CreateJob.to_string(), "create_job");
        assert_eq!(Endpoint::JobStatus.to_string(), "job_status");
    }
}
