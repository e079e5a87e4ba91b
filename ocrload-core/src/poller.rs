use std::time::Duration;

use tokio::time::Instant;

use crate::api::{JobId, OcrApi, timed};
use crate::iteration::{Endpoint, RequestSample};

const PENDING: &str = "PENDING";
const PROCESSING: &str = "PROCESSING";
const DONE: &str = "DONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    /// Sleep between two status reads.
    pub interval: Duration,
    /// Wall-clock budget for the whole polling phase.
    pub deadline: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Done,
    Timeout,
    HttpError,
    /// Any other terminal status, kept verbatim.
    Terminal(String),
}

impl PollOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Done => DONE,
            Self::Timeout => "TIMEOUT",
            Self::HttpError => "HTTP_ERROR",
            Self::Terminal(status) => status,
        }
    }

    fn from_status(status: String) -> Self {
        if status == DONE {
            Self::Done
        } else {
            Self::Terminal(status)
        }
    }
}

fn is_pending(status: &str) -> bool {
    status == PENDING || status == PROCESSING
}

/// Polls `job` until it leaves PENDING/PROCESSING, a read fails, or `spec.deadline` is exceeded.
///
/// The deadline is checked before every read, so no read is issued once it has passed. Failed
/// reads are never retried. Every read is appended to `samples`.
pub async fn poll(
    api: &dyn OcrApi,
    job: &JobId,
    spec: PollSpec,
    samples: &mut Vec<RequestSample>,
) -> PollOutcome {
    let started = Instant::now();
    let mut reads = 0u64;

    loop {
        if started.elapsed() > spec.deadline {
            tracing::debug!(job = %job, reads, "poll deadline exceeded");
            return PollOutcome::Timeout;
        }

        let (latency, res) = timed(api.job_status(job)).await;
        reads += 1;
        samples.push(RequestSample {
            endpoint: Endpoint::JobStatus,
            latency,
            ok: !matches!(&res, Err(e) if e.is_http_failure()),
        });

        let status = match res {
            Ok(status) => status,
            Err(err) => {
                tracing::debug!(job = %job, reads, error = %err, "status read failed");
                return PollOutcome::HttpError;
            }
        };

        if !is_pending(&status) {
            tracing::debug!(job = %job, reads, status = %status, "job reached terminal status");
            return PollOutcome::from_status(status);
        }

        if spec.interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(spec.interval).await;
        }
    }
}
