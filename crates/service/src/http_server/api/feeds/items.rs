use axum::extract::{Path, State};
use axum::response::IntoResponse;
use http::header::CONTENT_TYPE;
use http::StatusCode;

use crate::http_server::api::ApiError;
use crate::http_server::credentials::Credential;
use crate::ServiceState;

#[tracing::instrument(skip(state))]
pub async fn get_handler(
    State(state): State<ServiceState>,
    Path((feed_name, item)): Path<(String, String)>,
    credential: Credential,
) -> Result<impl IntoResponse, ApiError> {
    let feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    let content = feed.get_item(&item).await?;
    let mime = mime_guess::from_path(&item).first_or_octet_stream();
    Ok(([(CONTENT_TYPE, mime.to_string())], content))
}

#[tracing::instrument(skip(state))]
pub async fn delete_handler(
    State(state): State<ServiceState>,
    Path((feed_name, item)): Path<(String, String)>,
    credential: Credential,
) -> Result<impl IntoResponse, ApiError> {
    let feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    feed.remove_item(&item, true).await?;
    tracing::info!(feed = %feed_name, item = %item, "item removed");
    Ok((StatusCode::OK, "Item Removed"))
}

#[tracing::instrument(skip(state))]
pub async fn empty_handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
) -> Result<StatusCode, ApiError> {
    let feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    let removed = feed.empty().await?;
    tracing::info!(feed = %feed_name, removed, "feed emptied");
    Ok(StatusCode::OK)
}
