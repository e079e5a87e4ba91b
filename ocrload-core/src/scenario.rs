use std::time::Duration;

use tokio::time::Instant;

use crate::api::{CallError, CallResult, OcrApi, timed};
use crate::iteration::{Endpoint, FailureReason, IterationOutcome, IterationResult, RequestSample};
use crate::poller::{PollOutcome, PollSpec, poll};

const JOB_FAILED: &str = "FAILED";

/// The unit of work a virtual user performs once per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    SyncCall,
    CreateAndPoll(PollSpec),
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyncCall => "sync_call",
            Self::CreateAndPoll(_) => "create_and_poll",
        }
    }

    /// Runs one iteration. Never fails: every error is folded into the returned outcome.
    pub async fn execute(&self, api: &dyn OcrApi) -> IterationResult {
        let started = Instant::now();
        let mut samples = Vec::with_capacity(2);

        let (outcome, poll_outcome) = match self {
            Self::SyncCall => (sync_call(api, &mut samples).await, None),
            Self::CreateAndPoll(spec) => create_and_poll(api, *spec, &mut samples).await,
        };

        IterationResult {
            outcome,
            elapsed: started.elapsed(),
            sampled_latencies: samples,
            poll_outcome,
        }
    }
}

fn failure(endpoint: Endpoint, err: CallError) -> IterationOutcome {
    let reason = match err {
        CallError::Transport(kind) => FailureReason::Transport { endpoint, kind },
        CallError::Status(status) => FailureReason::Protocol { endpoint, status },
        CallError::MissingField(_) => FailureReason::MissingJobId,
    };
    IterationOutcome::Failure(reason)
}

fn sample<T>(endpoint: Endpoint, latency: Duration, res: &CallResult<T>) -> RequestSample {
    RequestSample {
        endpoint,
        latency,
        ok: !matches!(res, Err(e) if e.is_http_failure()),
    }
}

async fn sync_call(api: &dyn OcrApi, samples: &mut Vec<RequestSample>) -> IterationOutcome {
    let (latency, res) = timed(api.submit_sync()).await;
    samples.push(sample(Endpoint::Sync, latency, &res));

    match res {
        Ok(()) => IterationOutcome::Success,
        Err(err) => failure(Endpoint::Sync, err),
    }
}

async fn create_and_poll(
    api: &dyn OcrApi,
    spec: PollSpec,
    samples: &mut Vec<RequestSample>,
) -> (IterationOutcome, Option<PollOutcome>) {
    let (latency, res) = timed(api.create_job()).await;
    samples.push(sample(Endpoint::CreateJob, latency, &res));

    let job = match res {
        Ok(job) => job,
        Err(err) => {
            tracing::debug!(error = %err, "job creation failed; skipping poll");
            return (failure(Endpoint::CreateJob, err), None);
        }
    };

    let polled = poll(api, &job, spec, samples).await;
    let outcome = match &polled {
        PollOutcome::Done => IterationOutcome::Success,
        PollOutcome::Timeout => IterationOutcome::Timeout,
        PollOutcome::HttpError => IterationOutcome::Failure(FailureReason::StatusReadFailed),
        PollOutcome::Terminal(status) if status == JOB_FAILED => {
            IterationOutcome::Failure(FailureReason::JobFailed)
        }
        PollOutcome::Terminal(status) => {
            IterationOutcome::Failure(FailureReason::UnexpectedStatus(status.clone()))
        }
    };

    (outcome, Some(polled))
}
