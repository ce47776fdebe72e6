use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;

use common::prelude::Opened;

use crate::http_server::api::ApiError;
use crate::http_server::credentials::{secret_cookie, Credential};
use crate::ServiceState;

/// Feed snapshot. A feed that does not exist yet is created on the spot and
/// its secret handed to the caller; the response always refreshes the
/// `Secret` cookie so a PIN holder walks away with the long-lived secret.
#[tracing::instrument(skip(state, jar))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let (feed, opened) = state
        .feeds()
        .open_or_create(&feed_name, credential.as_str())
        .await?;
    if opened == Opened::Created {
        tracing::info!(feed = %feed_name, "feed created on first visit");
    }

    let snapshot = feed.public().await?;
    let jar = jar.add(secret_cookie(feed.name(), &snapshot.secret));
    Ok((jar, Json(snapshot)))
}
