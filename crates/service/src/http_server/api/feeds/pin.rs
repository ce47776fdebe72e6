use axum::extract::{Path, State};
use http::StatusCode;

use crate::http_server::api::ApiError;
use crate::http_server::credentials::Credential;
use crate::ServiceState;

/// Set a fresh PIN. The request body is the PIN itself.
#[tracing::instrument(skip(state, body))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
    body: String,
) -> Result<StatusCode, ApiError> {
    let mut feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    feed.set_pin(body.trim()).await?;
    tracing::info!(feed = %feed_name, "pin set");
    Ok(StatusCode::OK)
}
