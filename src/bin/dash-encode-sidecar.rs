use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use dash_encode_core::cancel::CancelToken;
use dash_encode_core::encoder::{EncodeStageProgress, ProgressCallback};
use dash_encode_core::error::AppError;
use dash_encode_core::ffmpeg::parse_tool_error;
use dash_encode_core::sidecar_api::{self, DashEncodeParams};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcSuccess {
    id: u64,
    result: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcFailure {
    id: u64,
    error: RpcErrorPayload,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcErrorPayload {
    summary: String,
    detail: String,
}

#[derive(Debug, serde::Serialize)]
struct RpcEvent {
    event: String,
    payload: Value,
}

#[derive(Debug, Clone)]
struct ActiveJob {
    job_id: u64,
    cancel: CancelToken,
}

/// At most one encode runs at a time.
#[derive(Clone)]
struct JobState {
    active_job: Arc<Mutex<Option<ActiveJob>>>,
    next_job_id: Arc<AtomicU64>,
}

impl JobState {
    fn new() -> Self {
        Self {
            active_job: Arc::new(Mutex::new(None)),
            next_job_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn begin_job(&self) -> Result<ActiveJob, AppError> {
        let mut guard = self.active_job.lock();
        if let Some(existing) = guard.as_ref() {
            return Err(AppError::from(format!(
                "Another encode is already running (jobId={})",
                existing.job_id
            )));
        }
        let job = ActiveJob {
            job_id: self.next_job_id.fetch_add(1, Ordering::Relaxed),
            cancel: CancelToken::new(),
        };
        *guard = Some(job.clone());
        Ok(job)
    }

    fn finish_job(&self, job_id: u64) {
        let mut guard = self.active_job.lock();
        if guard.as_ref().is_some_and(|active| active.job_id == job_id) {
            *guard = None;
        }
    }

    fn current_job(&self) -> Option<ActiveJob> {
        self.active_job.lock().clone()
    }
}

struct ActiveJobGuard {
    state: JobState,
    job_id: u64,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.state.finish_job(self.job_id);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaProbeParams {
    input_path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DashCancelParams {
    job_id: Option<u64>,
}

type SharedWriter = Arc<Mutex<io::Stdout>>;

fn write_json_line<T: serde::Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| io::Error::other(format!("serialize response: {}", e)))?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn write_json_line_shared<T: serde::Serialize>(writer: &SharedWriter, value: &T) -> io::Result<()> {
    let mut guard = writer.lock();
    write_json_line(&mut *guard, value)
}

fn emit_rpc_event(writer: &SharedWriter, event: &str, payload: Value) {
    let message = RpcEvent {
        event: event.to_string(),
        payload,
    };
    let _ = write_json_line_shared(writer, &message);
}

fn emit_job_progress(writer: &SharedWriter, job_id: u64, progress: EncodeStageProgress) {
    emit_rpc_event(
        writer,
        "dash.job.progress",
        json!({
            "jobId": job_id,
            "stage": progress.stage,
            "progress": progress.progress,
        }),
    );
}

fn emit_job_error(writer: &SharedWriter, job_id: u64, error: &RpcErrorPayload) {
    emit_rpc_event(
        writer,
        "dash.job.error",
        json!({
            "jobId": job_id,
            "summary": error.summary,
            "detail": error.detail,
        }),
    );
}

fn emit_job_complete(writer: &SharedWriter, job_id: u64) {
    emit_rpc_event(writer, "dash.job.complete", json!({ "jobId": job_id }));
}

fn parse_error_payload(err: &AppError) -> RpcErrorPayload {
    match err {
        AppError::TranscodeFailed { code, log, .. } | AppError::PackagingFailed { code, log, .. } => {
            let parsed = parse_tool_error(log, Some(*code));
            RpcErrorPayload {
                summary: parsed.summary,
                detail: parsed.detail,
            }
        }
        _ => {
            let text = err.to_string();
            RpcErrorPayload {
                summary: text.clone(),
                detail: text,
            }
        }
    }
}

fn params_from_value<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params)
        .map_err(|e| AppError::from(format!("Invalid params payload: {}", e)))
}

fn to_value<T: serde::Serialize>(value: T, what: &str) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::from(format!("Failed to serialize {}: {}", what, e)))
}

fn dispatch_sync(method: &str, params: Value, jobs: &JobState) -> Result<Value, AppError> {
    match method {
        "app.capabilities" => to_value(sidecar_api::app_capabilities()?, "app capabilities"),
        "media.probe" => {
            let parsed: MediaProbeParams = params_from_value(params)?;
            to_value(sidecar_api::probe_media(parsed.input_path)?, "metadata")
        }
        "dash.cancel" => {
            let parsed: DashCancelParams = params_from_value(params)?;
            match (jobs.current_job(), parsed.job_id) {
                (None, Some(job_id)) => Err(AppError::from(format!("Unknown jobId: {}", job_id))),
                (None, None) => Ok(json!({ "cancelled": false, "jobId": Value::Null })),
                (Some(active), Some(job_id)) if active.job_id != job_id => {
                    Err(AppError::from(format!("Unknown jobId: {}", job_id)))
                }
                (Some(active), _) => {
                    log::info!(target: "dash_encode::sidecar", "Cancelling job {}", active.job_id);
                    active.cancel.cancel();
                    Ok(json!({ "cancelled": true, "jobId": active.job_id }))
                }
            }
        }
        "dash.encode" => Err(AppError::from("dash.encode requires async execution")),
        _ => Err(AppError::from(format!("Unknown method: {}", method))),
    }
}

fn write_response(writer: &SharedWriter, id: u64, result: Result<Value, AppError>) {
    let response = match result {
        Ok(result) => serde_json::to_value(RpcSuccess { id, result })
            .map_err(|e| io::Error::other(format!("serialize success: {}", e))),
        Err(err) => serde_json::to_value(RpcFailure {
            id,
            error: parse_error_payload(&err),
        })
        .map_err(|e| io::Error::other(format!("serialize failure: {}", e))),
    };

    match response {
        Ok(value) => {
            let _ = write_json_line_shared(writer, &value);
        }
        Err(err) => {
            let failure = RpcFailure {
                id,
                error: RpcErrorPayload {
                    summary: "Serialization error".to_string(),
                    detail: err.to_string(),
                },
            };
            let _ = write_json_line_shared(writer, &failure);
        }
    }
}

fn handle_sync_request(request: RpcRequest, writer: &SharedWriter, jobs: &JobState) {
    let result = dispatch_sync(&request.method, request.params, jobs);
    write_response(writer, request.id, result);
}

fn handle_dash_encode(request: RpcRequest, writer: &SharedWriter, jobs: &JobState) {
    let params: DashEncodeParams = match params_from_value(request.params) {
        Ok(params) => params,
        Err(err) => return write_response(writer, request.id, Err(err)),
    };

    let job = match jobs.begin_job() {
        Ok(job) => job,
        Err(err) => return write_response(writer, request.id, Err(err)),
    };
    let _job_guard = ActiveJobGuard {
        state: jobs.clone(),
        job_id: job.job_id,
    };
    log::info!(
        target: "dash_encode::sidecar",
        "Starting job {}: {}",
        job.job_id,
        params.input_path.display()
    );

    let writer_for_events = Arc::clone(writer);
    let job_id = job.job_id;
    let progress: ProgressCallback =
        Arc::new(move |p| emit_job_progress(&writer_for_events, job_id, p));

    let result = sidecar_api::dash_encode_with_events(params, Some(progress), job.cancel.clone())
        .and_then(|summary| to_value(summary, "encode result"));
    match &result {
        Ok(_) => emit_job_complete(writer, job_id),
        Err(err) => emit_job_error(writer, job_id, &parse_error_payload(err)),
    }
    write_response(writer, request.id, result);
}

fn main() -> io::Result<()> {
    // stdout carries the protocol; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let stdin = io::stdin();
    let stdout: SharedWriter = Arc::new(Mutex::new(io::stdout()));
    let jobs = JobState::new();
    let mut async_workers: Vec<thread::JoinHandle<()>> = Vec::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid input stream".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid request".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        if request.method == "dash.encode" {
            let writer = Arc::clone(&stdout);
            let job_state = jobs.clone();
            async_workers.retain(|w| !w.is_finished());
            async_workers.push(thread::spawn(move || {
                handle_dash_encode(request, &writer, &job_state);
            }));
        } else {
            handle_sync_request(request, &stdout, &jobs);
        }
    }

    for worker in async_workers {
        let _ = worker.join();
    }
    Ok(())
}
