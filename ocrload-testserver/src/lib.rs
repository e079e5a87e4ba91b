use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_SYNC: &str = "/ocr/sync";
pub const PATH_JOBS: &str = "/ocr/jobs";
pub const DEFAULT_PREFIX: &str = "/api/v3";

/// What a status read answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStep {
    Status(String),
    /// Non-200 answer with no body.
    HttpStatus(u16),
}

impl JobStep {
    pub fn status(s: &str) -> Self {
        Self::Status(s.to_string())
    }
}

/// How the mock OCR service behaves. Every job walks `job_script`; its last step repeats.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub sync_status: u16,
    pub sync_delay: Duration,
    pub create_status: u16,
    pub create_omits_job_id: bool,
    /// Hand out `"jobId": 1` instead of `"jobId": "1"`.
    pub numeric_job_ids: bool,
    pub job_script: Vec<JobStep>,
    pub status_delay: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            sync_status: 200,
            sync_delay: Duration::ZERO,
            create_status: 200,
            create_omits_job_id: false,
            numeric_job_ids: true,
            job_script: vec![
                JobStep::status("PENDING"),
                JobStep::status("PROCESSING"),
                JobStep::status("DONE"),
            ],
            status_delay: Duration::ZERO,
        }
    }
}

/// Parses `PENDING,PROCESSING,DONE` / `PENDING,500` style scripts.
pub fn parse_job_script(raw: &str) -> anyhow::Result<Vec<JobStep>> {
    let steps: Vec<JobStep> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u16>() {
            Ok(code) => JobStep::HttpStatus(code),
            Err(_) => JobStep::status(s),
        })
        .collect();

    if steps.is_empty() {
        anyhow::bail!("job script must contain at least one step");
    }
    Ok(steps)
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    sync_requests: Arc<AtomicU64>,
    create_requests: Arc<AtomicU64>,
    status_requests: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
    saw_document_ref: Arc<AtomicU64>,
}

impl TestServerStats {
    pub fn sync_requests(&self) -> u64 {
        self.sync_requests.load(Ordering::Relaxed)
    }

    pub fn create_requests(&self) -> u64 {
        self.create_requests.load(Ordering::Relaxed)
    }

    pub fn status_requests(&self) -> u64 {
        self.status_requests.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }

    pub fn saw_document_ref(&self) -> u64 {
        self.saw_document_ref.load(Ordering::Relaxed)
    }

    fn inspect_document_request(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        if headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
        }

        let ok = serde_json::from_slice::<DocumentRequest>(body)
            .is_ok_and(|req| !req.document_ref.is_empty());
        if ok {
            self.saw_document_ref.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }
}

#[derive(Debug, Deserialize)]
struct DocumentRequest {
    #[serde(rename = "documentRef")]
    document_ref: String,
}

#[derive(Clone)]
struct AppState {
    behavior: Arc<MockBehavior>,
    stats: TestServerStats,
    next_job_id: Arc<AtomicU64>,
    /// Status reads served so far, per job.
    jobs: Arc<Mutex<HashMap<u64, usize>>>,
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn handle_sync(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    state.stats.sync_requests.fetch_add(1, Ordering::Relaxed);
    if !state.stats.inspect_document_request(&headers, &body) {
        return StatusCode::BAD_REQUEST;
    }

    if !state.behavior.sync_delay.is_zero() {
        sleep(state.behavior.sync_delay).await;
    }
    status_code(state.behavior.sync_status)
}

async fn handle_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.stats.create_requests.fetch_add(1, Ordering::Relaxed);
    if !state.stats.inspect_document_request(&headers, &body) {
        return (StatusCode::BAD_REQUEST, String::new());
    }

    let status = status_code(state.behavior.create_status);
    if status != StatusCode::OK {
        return (status, String::new());
    }
    if state.behavior.create_omits_job_id {
        return (StatusCode::OK, json!({}).to_string());
    }

    let id = state.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;
    state
        .jobs
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(id, 0);

    let body = if state.behavior.numeric_job_ids {
        json!({ "jobId": id })
    } else {
        json!({ "jobId": id.to_string() })
    };
    (StatusCode::OK, body.to_string())
}

async fn handle_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> (StatusCode, String) {
    state.stats.status_requests.fetch_add(1, Ordering::Relaxed);

    let Ok(id) = job_id.parse::<u64>() else {
        return (StatusCode::NOT_FOUND, String::new());
    };

    let step = {
        let mut jobs = state
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(reads) = jobs.get_mut(&id) else {
            return (StatusCode::NOT_FOUND, String::new());
        };
        let script = &state.behavior.job_script;
        let step = script.get((*reads).min(script.len().saturating_sub(1))).cloned();
        *reads += 1;
        step
    };

    if !state.behavior.status_delay.is_zero() {
        sleep(state.behavior.status_delay).await;
    }

    match step {
        Some(JobStep::Status(status)) => (StatusCode::OK, json!({ "status": status }).to_string()),
        Some(JobStep::HttpStatus(code)) => (status_code(code), String::new()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
    }
}

/// Mock OCR routes mounted under `prefix` (e.g. `/api/v3`, or `""`).
pub fn router(prefix: &str, behavior: MockBehavior, stats: TestServerStats) -> Router {
    let state = AppState {
        behavior: Arc::new(behavior),
        stats,
        next_job_id: Arc::new(AtomicU64::new(0)),
        jobs: Arc::new(Mutex::new(HashMap::new())),
    };

    let prefix = prefix.trim_end_matches('/');
    Router::new()
        .route(&format!("{prefix}{PATH_SYNC}"), post(handle_sync))
        .route(&format!("{prefix}{PATH_JOBS}"), post(handle_create))
        .route(&format!("{prefix}{PATH_JOBS}/{{job_id}}"), get(handle_status))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Default behavior under `/api/v3`.
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(DEFAULT_PREFIX, MockBehavior::default()).await
    }

    pub async fn start_with(prefix: &str, behavior: MockBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(prefix, behavior, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
