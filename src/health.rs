use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::git::VcsClient;
use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub archive_root: CheckResult,
    pub git: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: Some(detail.into()),
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

/// The root may legitimately be absent until the first archive call.
async fn check_archive_root(root: &Path) -> CheckResult {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => CheckResult::healthy(root.display().to_string()),
        Ok(_) => CheckResult::unhealthy(format!("{} is not a directory", root.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::healthy(format!("{} will be created on first use", root.display()))
        }
        Err(e) => CheckResult::unhealthy(format!("cannot stat {}: {e}", root.display())),
    }
}

async fn check_git(vcs: &dyn VcsClient) -> CheckResult {
    match vcs.version().await {
        Ok(version) => CheckResult::healthy(version),
        Err(e) => CheckResult::unhealthy(format!("git unavailable: {e}")),
    }
}

fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    if checks.archive_root.ok && checks.git.ok {
        HealthStatus::Ok
    } else {
        HealthStatus::Unhealthy
    }
}

// ---------------------------------------------------------------------------
// Axum handlers
// ---------------------------------------------------------------------------

/// `GET /hello`.  Fixed acknowledgement; no side effects.
pub async fn hello_handler() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "Hello World",
    })
}

/// `GET /healthz`.  Returns 200 when healthy, 503 otherwise.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (archive_root, git) = tokio::join!(
        check_archive_root(state.archive.root()),
        check_git(state.archive.vcs()),
    );

    let checks = HealthChecks { archive_root, git };
    let status = aggregate_status(&checks);
    let body = HealthResponse { status, checks };

    let http_status = match status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(body))
}
