use axum::routing::get;
use axum::Router;

mod error;
pub mod feeds;
mod ping;

pub use error::{feed_error_response, status_for, ApiError, ApiResult};

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(ping::handler))
        .nest("/feeds", feeds::router(state.clone()))
        .with_state(state)
}
