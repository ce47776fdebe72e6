//! Server-wide settings persisted as `{data_dir}/config.toml`.
//!
//! ```toml
//! [notification]
//! vapid_public_key = "BN..."
//! vapid_private_key = "x3..."
//! ```
//!
//! The file is created on first start with a freshly generated VAPID key
//! pair, so push subscriptions survive restarts.

use std::io;
use std::path::{Path, PathBuf};

use common::feed_manager::SERVER_CONFIG_FILE_NAME;
use common::prelude::{NotificationSettings, PushError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub notification: NotificationSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unable to read settings {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to write settings {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unable to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid notification keys: {0}")]
    Keys(#[from] PushError),
}

impl Settings {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SERVER_CONFIG_FILE_NAME)
    }

    /// Load the settings file, creating it when absent.
    pub async fn load_or_init(data_dir: &Path) -> Result<Self, SettingsError> {
        let path = Self::path(data_dir);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let settings: Settings = toml::from_str(&raw)
                    .map_err(|source| SettingsError::Parse { path, source })?;
                settings.notification.validate()?;
                Ok(settings)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "generating VAPID keys");
                let settings = Settings {
                    notification: NotificationSettings::generate(),
                };
                settings.write(data_dir).await?;
                Ok(settings)
            }
            Err(source) => Err(SettingsError::Read { path, source }),
        }
    }

    pub async fn write(&self, data_dir: &Path) -> Result<(), SettingsError> {
        use tokio::io::AsyncWriteExt;

        let path = Self::path(data_dir);
        let raw = toml::to_string_pretty(self)?;
        let write_err = |source| SettingsError::Write {
            path: path.clone(),
            source,
        };

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&path).await.map_err(write_err)?;
        file.write_all(raw.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        Ok(())
    }
}
