//! Main axum router and HTTP request handlers.
//!
//! Routes:
//! - `GET    /hello`                 - Fixed acknowledgement
//! - `POST   /archives/?repo_url=`   - Clone a repository into the archive
//! - `DELETE /archives/?repo_name=`  - Remove an archived repository
//! - `GET    /archives/`             - List archive entries
//! - `GET    /archives/size`         - Per-entry sizes, counts and origin URLs
//! - `PUT    /archives/all/update`   - Fetch and merge every entry
//! - `POST   /archives/all/reclone`  - Delete and re-clone every entry
//! - `GET    /healthz`               - Health check
//! - `GET    /metrics`               - Prometheus metrics
//!
//! Every `/archives` route requires the API key.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::archive::{ArchiveError, EntryDetails, UpdateSummary};
use crate::auth::middleware::require_api_key;
use crate::metrics::Operation;
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    let collection = get(handle_list)
        .post(handle_archive)
        .delete(handle_remove);

    let archives = Router::new()
        .route("/archives", collection.clone())
        .route("/archives/", collection)
        .route("/archives/size", get(handle_list_sizes))
        .route("/archives/all/update", put(handle_update_all))
        .route("/archives/all/reclone", post(handle_reclone_all))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/hello", get(crate::health::hello_handler))
        .route("/healthz", get(crate::health::health_handler))
        .route("/metrics", get(handle_metrics))
        .merge(archives)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArchiveQuery {
    repo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoveQuery {
    repo_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub message: String,
    pub repo_list: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SizeResponse {
    pub message: String,
    pub repo_details: Vec<EntryDetails>,
    pub total_size_gigabytes: f64,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub update_summary: UpdateSummary,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /archives/?repo_url=<https url>`
#[instrument(skip(state))]
async fn handle_archive(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let repo_url = required(query.repo_url, "repo_url")?;
    let path = timed(&state, Operation::Archive, state.archive.archive(&repo_url)).await?;

    Ok(Json(MessageResponse {
        message: format!("Repository cloned successfully to {}", path.display()),
    }))
}

/// `DELETE /archives/?repo_name=<entry>`
#[instrument(skip(state))]
async fn handle_remove(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let repo_name = required(query.repo_name, "repo_name")?;
    let path = timed(&state, Operation::Remove, state.archive.remove(&repo_name)).await?;

    Ok(Json(MessageResponse {
        message: format!("Repository removed successfully from {}", path.display()),
    }))
}

/// `GET /archives/`
#[instrument(skip(state))]
async fn handle_list(State(state): State<Arc<AppState>>) -> Result<Json<ListResponse>, AppError> {
    let repo_list = timed(&state, Operation::List, state.archive.list()).await?;

    Ok(Json(ListResponse {
        message: format!(
            "Repositories listed successfully from {}",
            state.archive.root().display()
        ),
        repo_list,
    }))
}

/// `GET /archives/size`
#[instrument(skip(state))]
async fn handle_list_sizes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SizeResponse>, AppError> {
    let report = timed(&state, Operation::ListSizes, state.archive.list_with_sizes()).await?;
    state
        .metrics
        .set_archive_usage(report.entries.len(), report.total_bytes);

    let total_size_gigabytes = report.total_size_gigabytes();
    Ok(Json(SizeResponse {
        message: format!(
            "Details retrieved successfully for repositories in {}",
            state.archive.root().display()
        ),
        repo_details: report.entries,
        total_size_gigabytes,
    }))
}

/// `PUT /archives/all/update`
#[instrument(skip(state))]
async fn handle_update_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UpdateResponse>, AppError> {
    let update_summary = timed(&state, Operation::UpdateAll, state.archive.update_all()).await?;

    Ok(Json(UpdateResponse {
        message: format!(
            "Repositories updated successfully in {}",
            state.archive.root().display()
        ),
        update_summary,
    }))
}

/// `POST /archives/all/reclone`
#[instrument(skip(state))]
async fn handle_reclone_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let count = timed(&state, Operation::RecloneAll, state.archive.reclone_all()).await?;
    debug!(count, "reclone finished");

    Ok(Json(MessageResponse {
        message: format!(
            "Repositories re-cloned successfully in {}",
            state.archive.root().display()
        ),
    }))
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the service.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let buf = state
        .metrics
        .encode()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::InvalidInput(format!("missing query parameter `{name}`")))
}

/// Await an archive operation and record its outcome and latency.
async fn timed<T>(
    state: &AppState,
    operation: Operation,
    fut: impl Future<Output = Result<T, ArchiveError>>,
) -> Result<T, AppError> {
    let started = Instant::now();
    let result = fut.await;
    state
        .metrics
        .record(operation, result.is_ok(), started.elapsed());
    result.map_err(AppError::from)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.
///
/// Every variant renders as `{"detail": "<text>"}`.
#[derive(Debug)]
pub enum AppError {
    /// Malformed URL, unsafe entry name, or missing parameter.
    InvalidInput(String),
    /// Missing or wrong API key.
    Unauthorized(String),
    /// git failed; `detail` is git's stderr.
    ExternalTool { command: String, detail: String },
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::InvalidInput(msg) => {
                debug!(detail = %msg, "rejected invalid input");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ExternalTool { command, detail } => {
                error!(%command, stderr = %detail.trim(), "git command failed");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::InvalidInput(msg) => AppError::InvalidInput(msg),
            ArchiveError::ExternalToolFailure(git) => AppError::ExternalTool {
                command: git.command().to_string(),
                detail: git.to_string(),
            },
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
