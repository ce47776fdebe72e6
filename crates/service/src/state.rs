use std::sync::Arc;

use common::prelude::{FeedManager, NotificationHub, PushNotifier, PushTransport};

use super::config::Config;
use super::settings::{Settings, SettingsError};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct State {
    feeds: FeedManager,
    settings: Arc<Settings>,
    max_upload_size: u64,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Data directory
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(StateSetupError::DataDir)?;
        tracing::info!(data_dir = %config.data_dir.display(), "using data directory");

        // 2. Server settings, generating VAPID keys on first start
        let settings = Settings::load_or_init(&config.data_dir).await?;

        // 3. Push delivery
        let transport = default_transport();
        if transport.is_none() {
            tracing::warn!("built without web push support, notifications disabled");
        }

        Ok(Self::new(config, settings, transport))
    }

    /// Assemble state from parts. `transport` decides whether added items
    /// trigger push notifications at all.
    pub fn new(
        config: &Config,
        settings: Settings,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> Self {
        let push = transport.map(|t| PushNotifier::new(settings.notification.clone(), t));
        let feeds = FeedManager::new(config.data_dir.clone(), NotificationHub::new(), push);

        Self {
            feeds,
            settings: Arc::new(settings),
            max_upload_size: config.max_upload_size,
        }
    }

    pub fn feeds(&self) -> &FeedManager {
        &self.feeds
    }

    pub fn hub(&self) -> &NotificationHub {
        self.feeds.hub()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn vapid_public_key(&self) -> &str {
        &self.settings.notification.vapid_public_key
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }
}

#[cfg(feature = "web-push")]
fn default_transport() -> Option<Arc<dyn PushTransport>> {
    Some(Arc::new(crate::push_transport::WebPushTransport::default()))
}

#[cfg(not(feature = "web-push"))]
fn default_transport() -> Option<Arc<dyn PushTransport>> {
    None
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("unable to create data directory: {0}")]
    DataDir(#[source] std::io::Error),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}
