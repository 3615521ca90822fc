use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::config::AuthConfig;
use crate::http::handler::AppError;
use crate::AppState;

/// Reject the request with 401 unless it carries the configured API key.
///
/// Installed as a route layer, so it runs before any handler touches the
/// filesystem or spawns git.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = extract_api_key(request.uri(), request.headers(), &state.config.auth);

    if let Err(reason) = state.api_key.verify(presented.as_deref()) {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            %reason,
            "rejected unauthenticated request"
        );
        return Err(AppError::Unauthorized(reason.to_string()));
    }

    Ok(next.run(request).await)
}

/// Pull the API key from the configured header, falling back to the query
/// string.
pub fn extract_api_key(uri: &Uri, headers: &HeaderMap, auth: &AuthConfig) -> Option<String> {
    if let Some(value) = headers
        .get(auth.header_name.as_str())
        .and_then(|v| v.to_str().ok())
    {
        return Some(value.to_owned());
    }

    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == auth.query_param.as_str())
        .map(|(_, value)| value.into_owned())
}
