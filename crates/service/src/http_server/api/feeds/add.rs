use std::io;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use tokio_util::io::StreamReader;

use common::prelude::{FeedError, FeedItem};

use crate::http_server::api::{feed_error_response, ApiResult};
use crate::http_server::credentials::Credential;
use crate::ServiceState;

/// Add one item. A `multipart/form-data` upload contributes its first part
/// (with that part's content type and file name); any other request is
/// stored from its raw body using the request content type.
#[tracing::instrument(skip(state, request))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
    request: Request,
) -> Result<impl IntoResponse, AddError> {
    let feed = state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await?;
    let max_size = state.max_upload_size();

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let item: FeedItem = match content_type.as_deref() {
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let mut multipart = Multipart::from_request(request, &state).await?;
            let field = multipart.next_field().await?.ok_or(AddError::MissingPart)?;
            let part_type = field.content_type().map(str::to_string);
            let file_name = field.file_name().map(str::to_string);

            let reader = StreamReader::new(Box::pin(field.map_err(io::Error::other)));
            feed.add_item(part_type.as_deref(), file_name.as_deref(), reader, max_size)
                .await?
        }
        _ => {
            let body = request.into_body().into_data_stream();
            let reader = StreamReader::new(Box::pin(body.map_err(io::Error::other)));
            feed.add_item(content_type.as_deref(), None, reader, max_size)
                .await?
        }
    };

    tracing::info!(feed = %feed_name, item = %item.name, "item added");
    Ok((StatusCode::OK, "OK"))
}

#[derive(Debug, thiserror::Error)]
pub enum AddError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("invalid multipart request: {0}")]
    Rejected(#[from] MultipartRejection),
    #[error("error while getting next part: {0}")]
    Multipart(#[from] MultipartError),
    #[error("multipart request has no parts")]
    MissingPart,
}

impl IntoResponse for AddError {
    fn into_response(self) -> Response {
        match self {
            AddError::Feed(err) => feed_error_response(&err),
            AddError::Rejected(_) | AddError::Multipart(_) | AddError::MissingPart => {
                tracing::debug!(error = %self, "upload rejected");
                (StatusCode::BAD_REQUEST, Json(ApiResult::error(self.to_string()))).into_response()
            }
        }
    }
}
