//! The REST surface (spec.md §6 "HTTP plane"), grounded on the teacher's
//! `routes::create_routes` composition — one `Router` built from small
//! handler functions, `AppState` injected via `.with_state`.

use crate::dispatcher::kernel_status;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use kernel_auth::User;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/processes", get(list_processes))
        .route("/api/kernel", get(kernel_info))
        .route("/api/history/processes", get(history_processes))
        .route("/api/history/logs", get(history_logs))
        .route("/api/history/logs/{pid}", get(history_logs_for_pid))
        .route("/api/history/files", get(history_files))
        .route("/api/history/metrics", get(history_metrics))
        .route("/api/plugins/{pid}", get(plugins_for_pid))
        .route("/api/plugins/{pid}/install", post(install_plugin_for_pid))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/cluster", get(cluster_status))
        .route("/api/cluster/spawn", post(cluster_spawn))
        .route("/api/gpu", get(gpu_info))
        .route("/api/gpu/stats", get(gpu_stats))
        .route("/api/fs/upload", post(fs_upload))
        .route("/api/fs/raw", get(fs_raw))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.started_at.elapsed().as_secs(),
        "processes": state.process.list().len(),
        "docker": state.docker_enabled,
        "containers": state.pty.session_count(),
    }))
}

async fn list_processes(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "processes": state.process.list_info() }))
}

async fn kernel_info(State(state): State<AppState>) -> Json<Value> {
    Json(kernel_status(&state).await)
}

/// All history endpoints report from [`Store`]'s durable rows, not the
/// live in-memory managers — this is the dashboard's "what already
/// happened" view, distinct from `/api/processes`'s live snapshot.
async fn history_processes(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.process.get_all_processes().await {
        Ok(rows) => Json(json!({ "processes": rows })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn history_logs(State(state): State<AppState>) -> impl IntoResponse {
    match all_logs(&state).await {
        Ok(rows) => Json(json!({ "logs": rows })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn all_logs(state: &AppState) -> kernel_core::Result<Vec<kernel_storage::AgentLogRow>> {
    let processes = state.store.process.get_all_processes().await?;
    let mut logs = Vec::new();
    for p in processes {
        logs.extend(state.store.process.get_agent_logs(p.pid).await?);
    }
    Ok(logs)
}

async fn history_logs_for_pid(State(state): State<AppState>, Path(pid): Path<i64>) -> impl IntoResponse {
    match state.store.process.get_agent_logs(pid).await {
        Ok(rows) => Json(json!({ "logs": rows })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn history_files(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };
    match state.store.fs.get_files_by_owner(&user.id.to_string()).await {
        Ok(rows) => Json(json!({ "files": rows })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn history_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.metrics.recent(100).await {
        Ok(rows) => Json(json!({ "metrics": rows })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn plugins_for_pid(State(state): State<AppState>, Path(pid): Path<String>) -> impl IntoResponse {
    let manifests = state.plugins.load_for_user(&pid).await;
    Json(json!({ "plugins": manifests })).into_response()
}

#[derive(Debug, Deserialize)]
struct InstallPluginBody {
    manifest: kernel_tools::PluginManifest,
    #[serde(default)]
    handlers: HashMap<String, String>,
}

async fn install_plugin_for_pid(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(body): Json<InstallPluginBody>,
) -> impl IntoResponse {
    match state.plugins.install_plugin(&uid, body.manifest, body.handlers).await {
        Ok(dir) => Json(json!({ "installed_at": dir.to_string_lossy() })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> impl IntoResponse {
    match state.auth.login(&body.username, &body.password).await {
        Ok((token, user)) => Json(json!({ "token": token, "user": user })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
    password: String,
    display_name: Option<String>,
}

async fn register(State(state): State<AppState>, Json(body): Json<RegisterBody>) -> impl IntoResponse {
    let display_name = body.display_name.clone().unwrap_or_else(|| body.username.clone());
    let create = state
        .auth
        .create_user(&body.username, &body.password, &display_name, kernel_core::SystemRole::User)
        .await;
    match create {
        Ok(_) => match state.auth.login(&body.username, &body.password).await {
            Ok((token, user)) => Json(json!({ "token": token, "user": user })).into_response(),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}

async fn cluster_status(State(state): State<AppState>) -> impl IntoResponse {
    let Some(registry) = &state.cluster else {
        return Json(json!({ "role": state.config.cluster_role, "nodes": [] })).into_response();
    };
    let now = chrono::Utc::now().timestamp_millis();
    let nodes: Vec<Value> = registry
        .list(now)
        .into_iter()
        .map(|(health, online)| json!({ "node": health, "online": online }))
        .collect();
    Json(json!({ "role": state.config.cluster_role, "nodes": nodes })).into_response()
}

/// Target of [`kernel_scheduler::cluster::forward_spawn`] on a `node`: the
/// hub posts the same `process.spawn` body here over a plain REST hop.
async fn cluster_spawn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let user = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };
    let config: kernel_process::ProcessConfig = match serde_json::from_value(body) {
        Ok(c) => c,
        Err(e) => return error_response(kernel_core::KernelError::invalid_argument(format!("malformed spawn body: {e}"))),
    };
    match state.process.spawn(config, None, &user.id.to_string(), &user.id.to_string()).await {
        Ok(pid) => Json(json!({ "pid": pid })).into_response(),
        Err(e) => error_response(e),
    }
}

/// No GPU telemetry exists in this kernel build's dependency stack (no
/// `nvml`/`sysinfo` crate is carried); both routes report that honestly
/// rather than fabricating a reading.
async fn gpu_info() -> Json<Value> {
    Json(json!({ "available": false, "devices": [] }))
}

async fn gpu_stats() -> Json<Value> {
    Json(json!({ "available": false, "stats": [] }))
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: String,
}

async fn fs_upload(State(state): State<AppState>, headers: HeaderMap, Query(q): Query<PathQuery>, body: axum::body::Bytes) -> impl IntoResponse {
    let user = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };
    match state.fs.upload(&body, &q.path, &user.id.to_string()).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn fs_raw(State(state): State<AppState>, Query(q): Query<PathQuery>) -> impl IntoResponse {
    match state.fs.read(&q.path).await {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => error_response(e),
    }
}

/// Validates `Authorization: Bearer <token>` against [`AuthManager`],
/// grounded on the teacher's `middleware::auth` (minus the API-key tier,
/// which this kernel has no equivalent of).
async fn authenticate(state: &AppState, headers: &HeaderMap) -> kernel_core::Result<User> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| kernel_core::KernelError::unauthorized("missing Authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| kernel_core::KernelError::unauthorized("Authorization header must be a Bearer token"))?;
    state
        .auth
        .validate_token(token)
        .await?
        .ok_or_else(|| kernel_core::KernelError::unauthorized("invalid or expired token"))
}

fn error_response(err: kernel_core::KernelError) -> axum::response::Response {
    let status = match &err {
        kernel_core::KernelError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        kernel_core::KernelError::Forbidden(_) => StatusCode::FORBIDDEN,
        kernel_core::KernelError::NotFound(_) => StatusCode::NOT_FOUND,
        kernel_core::KernelError::Conflict(_) => StatusCode::CONFLICT,
        kernel_core::KernelError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        kernel_core::KernelError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        kernel_core::KernelError::NetworkError(_) => StatusCode::BAD_GATEWAY,
        kernel_core::KernelError::SandboxUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        kernel_core::KernelError::ToolError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        kernel_core::KernelError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(kernel_core::WireError::from(&err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Response;

    fn status_of(response: Response) -> StatusCode {
        response.status()
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = kernel_core::KernelError::not_found("no such process");
        assert_eq!(status_of(error_response(err)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let err = kernel_core::KernelError::unauthorized("no token");
        assert_eq!(status_of(error_response(err)), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn sandbox_unavailable_maps_to_503() {
        let err = kernel_core::KernelError::SandboxUnavailable("no docker".to_string());
        assert_eq!(status_of(error_response(err)), StatusCode::SERVICE_UNAVAILABLE);
    }
}
