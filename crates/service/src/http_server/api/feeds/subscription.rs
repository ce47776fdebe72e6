use axum::extract::{Path, State};
use axum::Json;
use http::StatusCode;

use common::prelude::Subscription;

use crate::http_server::api::ApiError;
use crate::http_server::credentials::Credential;
use crate::ServiceState;

/// Register a browser `PushSubscription` for this feed.
#[tracing::instrument(skip(state, subscription))]
pub async fn add_handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
    Json(subscription): Json<Subscription>,
) -> Result<StatusCode, ApiError> {
    let mut feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    if feed.add_subscription(subscription).await? {
        tracing::info!(feed = %feed_name, "push subscription added");
    }
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(state, subscription))]
pub async fn remove_handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
    Json(subscription): Json<Subscription>,
) -> Result<StatusCode, ApiError> {
    let mut feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    if feed.remove_subscription(&subscription).await? {
        tracing::info!(feed = %feed_name, "push subscription removed");
    }
    Ok(StatusCode::OK)
}
