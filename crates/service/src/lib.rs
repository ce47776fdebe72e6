//! HTTP and websocket service for ybFeed.
//!
//! Wires the feed store from `common` to the outside world:
//! - application state and server-wide settings (VAPID keys)
//! - the axum API, websocket channel and health endpoints
//! - web push delivery
//! - process bootstrap (logging, graceful shutdown)

pub mod config;
pub mod http_server;
pub mod process;
#[cfg(feature = "web-push")]
pub mod push_transport;
pub mod settings;
pub mod state;

// Re-export key types for convenience
pub use config::Config as ServiceConfig;
pub use process::spawn_service;
pub use settings::{Settings, SettingsError};
pub use state::{State as ServiceState, StateSetupError};
