use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ocrload_http::{HttpClient, HttpRequest, HttpResponse, HttpTransportErrorKind};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::Target;
use crate::error::Result;

pub type CallResult<T> = std::result::Result<T, CallError>;
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = CallResult<T>> + Send + 'a>>;

/// Opaque job identifier handed out by job creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.is_empty()).then_some(Self(id))
    }

    /// The service may answer with a string or a numeric id; anything else is unusable.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::new(s.as_str()),
            serde_json::Value::Number(n) => Self::new(n.to_string()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(HttpTransportErrorKind),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("response body has no usable `{0}`")]
    MissingField(&'static str),
}

impl CallError {
    /// Whether the HTTP exchange itself failed (as opposed to a 200 with an unusable body).
    pub fn is_http_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_))
    }
}

/// The OCR service boundary.
pub trait OcrApi: Send + Sync {
    /// `POST /ocr/sync`; resolves once the service answered 200.
    fn submit_sync(&self) -> ApiFuture<'_, ()>;

    /// `POST /ocr/jobs`; resolves to the created job's id.
    fn create_job(&self) -> ApiFuture<'_, JobId>;

    /// `GET /ocr/jobs/{jobId}`; resolves to the literal job status.
    fn job_status<'a>(&'a self, job: &'a JobId) -> ApiFuture<'a, String>;
}

/// Bounds every call of `inner` by `timeout`; an expired call is a transport timeout.
pub(crate) struct TimeoutApi {
    inner: Arc<dyn OcrApi>,
    timeout: Duration,
}

impl TimeoutApi {
    pub(crate) fn new(inner: Arc<dyn OcrApi>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn bound<'a, T: 'a>(&self, fut: ApiFuture<'a, T>) -> ApiFuture<'a, T> {
        let timeout = self.timeout;
        Box::pin(async move {
            tokio::time::timeout(timeout, fut)
                .await
                .unwrap_or_else(|_| Err(CallError::Transport(HttpTransportErrorKind::Timeout)))
        })
    }
}

impl OcrApi for TimeoutApi {
    fn submit_sync(&self) -> ApiFuture<'_, ()> {
        self.bound(self.inner.submit_sync())
    }

    fn create_job(&self) -> ApiFuture<'_, JobId> {
        self.bound(self.inner.create_job())
    }

    fn job_status<'a>(&'a self, job: &'a JobId) -> ApiFuture<'a, String> {
        self.bound(self.inner.job_status(job))
    }
}

pub(crate) async fn timed<T>(fut: ApiFuture<'_, T>) -> (Duration, CallResult<T>) {
    let started = Instant::now();
    let res = fut.await;
    (started.elapsed(), res)
}

#[derive(Debug, Serialize)]
struct DocumentRequest<'a> {
    #[serde(rename = "documentRef")]
    document_ref: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobCreatedBody {
    #[serde(rename = "jobId", default)]
    job_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JobStatusBody {
    #[serde(default)]
    status: Option<serde_json::Value>,
}

/// [`OcrApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOcrApi {
    client: HttpClient,
    sync_url: String,
    jobs_url: url::Url,
    body: Bytes,
    timeout: Duration,
}

impl HttpOcrApi {
    pub fn new(client: HttpClient, target: &Target, timeout: Duration) -> Result<Self> {
        let body = serde_json::to_vec(&DocumentRequest {
            document_ref: &target.document_ref,
        })?;

        let jobs_url = target.endpoint("/ocr/jobs")?;

        Ok(Self {
            client,
            sync_url: target.endpoint("/ocr/sync")?.to_string(),
            jobs_url,
            body: Bytes::from(body),
            timeout,
        })
    }

    async fn send(&self, req: HttpRequest) -> CallResult<HttpResponse> {
        let method = req.method.clone();
        let url = req.url.clone();

        match self.client.request(req.with_timeout(self.timeout)).await {
            Ok(res) if res.is_ok() => Ok(res),
            Ok(res) => {
                tracing::debug!(%method, %url, status = res.status, "ocr request rejected");
                Err(CallError::Status(res.status))
            }
            Err(err) => {
                tracing::debug!(%method, %url, error = %err, "ocr request failed");
                Err(CallError::Transport(err.transport_error_kind()))
            }
        }
    }

    fn job_url(&self, job: &JobId) -> CallResult<String> {
        let mut url = self.jobs_url.clone();
        url.path_segments_mut()
            .map_err(|_| CallError::Transport(HttpTransportErrorKind::InvalidUrl))?
            .push(job.as_str());
        Ok(url.into())
    }
}

impl OcrApi for HttpOcrApi {
    fn submit_sync(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let req = HttpRequest::post_json(self.sync_url.clone(), self.body.clone());
            self.send(req).await.map(|_| ())
        })
    }

    fn create_job(&self) -> ApiFuture<'_, JobId> {
        Box::pin(async move {
            let req = HttpRequest::post_json(self.jobs_url.to_string(), self.body.clone());
            let res = self.send(req).await?;

            serde_json::from_slice::<JobCreatedBody>(&res.body)
                .ok()
                .and_then(|b| b.job_id)
                .as_ref()
                .and_then(JobId::from_json)
                .ok_or(CallError::MissingField("jobId"))
        })
    }

    fn job_status<'a>(&'a self, job: &'a JobId) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let req = HttpRequest::get_owned(self.job_url(job)?);
            let res = self.send(req).await?;

            match serde_json::from_slice::<JobStatusBody>(&res.body)
                .ok()
                .and_then(|b| b.status)
            {
                Some(serde_json::Value::String(status)) => Ok(status),
                _ => Err(CallError::MissingField("status")),
            }
        })
    }
}
