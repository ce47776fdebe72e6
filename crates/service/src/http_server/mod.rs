use axum::routing::get;
use axum::Router;
use http::{HeaderName, HeaderValue};
use tokio::sync::watch;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

use common::prelude::build_info;

pub mod api;
mod config;
pub mod credentials;
mod handlers;
mod health;
pub mod ws;

pub use config::Config;

use crate::ServiceState;

const API_PREFIX: &str = "/api";
const STATUS_PREFIX: &str = "/_status";

pub const VERSION_HEADER: HeaderName = HeaderName::from_static("ybfeed-version");
pub const VAPID_PUBLIC_KEY_HEADER: HeaderName = HeaderName::from_static("ybfeed-vapidpublickey");

/// Every route the service answers, without transport concerns.
pub fn router(state: ServiceState) -> Router {
    let version = HeaderValue::from_str(&build_info().version)
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    let vapid_public_key = HeaderValue::from_str(state.vapid_public_key())
        .unwrap_or_else(|_| HeaderValue::from_static(""));

    Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .nest(API_PREFIX, api::router(state.clone()))
        .route("/ws/:feed", get(ws::handler))
        .fallback(handlers::not_found_handler)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(VERSION_HEADER, version))
        .layer(SetResponseHeaderLayer::overriding(
            VAPID_PUBLIC_KEY_HEADER,
            vapid_public_key,
        ))
}

pub async fn run(
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listen_addr = config.listen_addr;
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let app = router(state).layer(trace_layer);

    tracing::info!(addr = ?listen_addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
