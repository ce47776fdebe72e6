use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

pub mod add;
pub mod get;
pub mod items;
pub mod pin;
pub mod subscription;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/:feed", get(get::handler).patch(pin::handler))
        // uploads are bounded by the configured max upload size instead
        .route("/:feed", post(add::handler).layer(DefaultBodyLimit::disable()))
        .route("/:feed/items", delete(items::empty_handler))
        .route(
            "/:feed/items/:item",
            get(items::get_handler).delete(items::delete_handler),
        )
        .route(
            "/:feed/subscription",
            post(subscription::add_handler).delete(subscription::remove_handler),
        )
        .with_state(state)
}
