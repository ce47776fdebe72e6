use axum::response::{IntoResponse, Response};
use axum::Json;
use common::prelude::{FeedError, FeedErrorKind};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Short machine-readable outcome returned by mutation endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult {
    pub status: String,
    pub message: String,
}

impl ApiResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

pub fn status_for(kind: FeedErrorKind) -> StatusCode {
    match kind {
        FeedErrorKind::NotFound => StatusCode::NOT_FOUND,
        FeedErrorKind::Unauthorized | FeedErrorKind::Forbidden => StatusCode::UNAUTHORIZED,
        FeedErrorKind::Conflict => StatusCode::CONFLICT,
        FeedErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        FeedErrorKind::ResourceExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        FeedErrorKind::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn feed_error_response(err: &FeedError) -> Response {
    let status = status_for(err.kind());
    let message = if status.is_server_error() {
        tracing::error!(error = %err, "feed operation failed");
        "Unexpected error".to_string()
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "feed request rejected");
        err.to_string()
    };
    (status, Json(ApiResult::error(message))).into_response()
}

/// Error for handlers whose only failure source is the feed store.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Feed(err) => feed_error_response(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (FeedError::FeedNotFound("x".into()), StatusCode::NOT_FOUND),
            (FeedError::ItemNotFound("x".into()), StatusCode::NOT_FOUND),
            (FeedError::Unauthorized, StatusCode::UNAUTHORIZED),
            (FeedError::IncorrectSecret, StatusCode::UNAUTHORIZED),
            (FeedError::PinExpired, StatusCode::UNAUTHORIZED),
            (FeedError::InvalidPinLength, StatusCode::BAD_REQUEST),
            (FeedError::InvalidContentType("x".into()), StatusCode::BAD_REQUEST),
            (FeedError::MaxSizeExceeded { limit: 1 }, StatusCode::PAYLOAD_TOO_LARGE),
            (
                FeedError::StoreUnreadable(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(err.kind()), status, "{err}");
        }
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let response = feed_error_response(&FeedError::StoreUnreadable(std::io::Error::other(
            "/secret/path",
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
