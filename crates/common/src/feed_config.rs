//! Persisted per-feed settings.
//!
//! Each feed directory holds a single `config.json` that is the only source of
//! truth for its secret, PIN and push subscriptions:
//!
//! ```json
//! {
//!   "secret": "b90e516e-b256-41ff-a84e-a9e8d5b6fe30",
//!   "pin": { "pin": "1234", "expiration": "2024-01-01T12:02:00Z" },
//!   "subscriptions": [
//!     { "endpoint": "https://push.example/abc", "keys": { "auth": "...", "p256dh": "..." } }
//!   ]
//! }
//! ```
//!
//! Older feeds kept the secret and PIN as two plain files (`secret`, `pin`).
//! [`FeedConfig::load`] migrates those once into `config.json` and removes them.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LEGACY_SECRET_FILE_NAME: &str = "secret";
pub const LEGACY_PIN_FILE_NAME: &str = "pin";
/// Written first, then renamed over [`CONFIG_FILE_NAME`].
pub const CONFIG_STAGING_FILE_NAME: &str = ".config.json.tmp";

/// Number of characters in a PIN.
pub const PIN_LENGTH: usize = 4;
/// How long a PIN stays valid after being set.
pub const PIN_VALIDITY_SECS: i64 = 120;

pub fn pin_validity() -> TimeDelta {
    TimeDelta::seconds(PIN_VALIDITY_SECS)
}

#[derive(Debug, thiserror::Error)]
pub enum FeedConfigError {
    #[error("feed configuration not found: {0}")]
    NotFound(PathBuf),
    #[error("feed configuration invalid: {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("can't read feed configuration: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("can't write feed configuration: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("can't encode feed configuration: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("feed pin expired")]
    Expired,
    #[error("feed pin incorrect")]
    Incorrect,
    #[error("feed has no pin configured")]
    NotConfigured,
    #[error("feed pin length is not {}", PIN_LENGTH)]
    InvalidLength,
}

/// A short-lived numeric code standing in for the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub pin: String,
    pub expiration: DateTime<Utc>,
}

impl Pin {
    pub fn issue(value: &str, now: DateTime<Utc>) -> Result<Self, PinError> {
        if value.chars().count() != PIN_LENGTH {
            return Err(PinError::InvalidLength);
        }
        Ok(Self {
            pin: value.to_string(),
            expiration: now + pin_validity(),
        })
    }

    /// Expiry is checked before the value, so a stale PIN never reveals a match.
    pub fn check(&self, candidate: &str, now: DateTime<Utc>) -> Result<(), PinError> {
        if now > self.expiration {
            return Err(PinError::Expired);
        }
        if candidate != self.pin {
            return Err(PinError::Incorrect);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub auth: String,
    pub p256dh: String,
}

/// A browser push endpoint, in the shape `PushSubscription.toJSON()` produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<Pin>,
    #[serde(default, alias = "Subscriptions")]
    pub subscriptions: Vec<Subscription>,
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("secret", &"<redacted>")
            .field("pin", &self.pin.as_ref().map(|p| p.expiration))
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl FeedConfig {
    /// Fresh configuration with a random v4 UUID as secret.
    pub fn generate() -> Self {
        Self {
            secret: Uuid::new_v4().to_string(),
            pin: None,
            subscriptions: Vec::new(),
        }
    }

    pub async fn load(dir: &Path) -> Result<Self, FeedConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| FeedConfigError::Invalid {
                    path,
                    source,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::migrate_legacy(dir).await,
            Err(source) => Err(FeedConfigError::Read { path, source }),
        }
    }

    /// Atomically replace `config.json` in `dir`.
    pub async fn write(&self, dir: &Path) -> Result<(), FeedConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        let staging = dir.join(CONFIG_STAGING_FILE_NAME);
        let json = serde_json::to_vec_pretty(self)?;

        write_private_file(&staging, &json, false)
            .await
            .map_err(|source| FeedConfigError::Write {
                path: staging.clone(),
                source,
            })?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|source| FeedConfigError::Write { path, source })
    }

    async fn migrate_legacy(dir: &Path) -> Result<Self, FeedConfigError> {
        let secret_path = dir.join(LEGACY_SECRET_FILE_NAME);
        let secret = match tokio::fs::read_to_string(&secret_path).await {
            Ok(secret) => secret,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FeedConfigError::NotFound(dir.join(CONFIG_FILE_NAME)));
            }
            Err(source) => {
                return Err(FeedConfigError::Read {
                    path: secret_path,
                    source,
                })
            }
        };

        let pin_path = dir.join(LEGACY_PIN_FILE_NAME);
        let pin = match tokio::fs::metadata(&pin_path).await {
            Ok(meta) => {
                let read_err = |source| FeedConfigError::Read {
                    path: pin_path.clone(),
                    source,
                };
                let value = tokio::fs::read_to_string(&pin_path).await.map_err(read_err)?;
                let modified: DateTime<Utc> = meta.modified().map_err(read_err)?.into();
                Some(Pin {
                    pin: value,
                    expiration: modified + pin_validity(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(FeedConfigError::Read {
                    path: pin_path,
                    source,
                })
            }
        };

        let config = Self {
            secret,
            pin,
            subscriptions: Vec::new(),
        };
        config.write(dir).await?;

        for legacy in [secret_path, pin_path] {
            if let Err(e) = tokio::fs::remove_file(&legacy).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %legacy.display(), error = %e, "unable to remove legacy file");
                }
            }
        }
        tracing::info!(feed = %dir.display(), "migrated legacy secret/pin files to config.json");

        Ok(config)
    }

    pub fn set_pin_at(&mut self, value: &str, now: DateTime<Utc>) -> Result<(), PinError> {
        self.pin = Some(Pin::issue(value, now)?);
        Ok(())
    }

    pub fn check_pin_at(&self, candidate: &str, now: DateTime<Utc>) -> Result<(), PinError> {
        match &self.pin {
            Some(pin) => pin.check(candidate, now),
            None => Err(PinError::NotConfigured),
        }
    }

    /// Returns `false` when an identical subscription is already stored.
    pub fn add_subscription(&mut self, subscription: Subscription) -> bool {
        if self.subscriptions.contains(&subscription) {
            return false;
        }
        self.subscriptions.push(subscription);
        true
    }

    /// Returns `true` if anything was removed.
    pub fn remove_subscription(&mut self, subscription: &Subscription) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s != subscription);
        self.subscriptions.len() != before
    }
}

/// Write `data` to `path` readable by the owner only.
pub(crate) async fn write_private_file(path: &Path, data: &[u8], create_new: bool) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn subscription(endpoint: &str, auth: &str) -> Subscription {
        Subscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                auth: auth.to_string(),
                p256dh: "p256dh".to_string(),
            },
        }
    }

    #[test]
    fn test_pin_validity_boundary() {
        let t = Utc::now();
        let mut config = FeedConfig::generate();
        config.set_pin_at("1234", t).unwrap();

        assert!(config.check_pin_at("1234", t + TimeDelta::seconds(119)).is_ok());
        assert_eq!(
            config.check_pin_at("1234", t + TimeDelta::seconds(121)),
            Err(PinError::Expired)
        );
    }

    #[test]
    fn test_pin_errors() {
        let t = Utc::now();
        let mut config = FeedConfig::generate();
        assert_eq!(config.check_pin_at("1234", t), Err(PinError::NotConfigured));
        assert_eq!(config.set_pin_at("123", t), Err(PinError::InvalidLength));
        assert_eq!(config.set_pin_at("12345", t), Err(PinError::InvalidLength));

        config.set_pin_at("1234", t).unwrap();
        assert_eq!(config.check_pin_at("4321", t), Err(PinError::Incorrect));
    }

    #[test]
    fn test_subscription_set_semantics() {
        let mut config = FeedConfig::generate();
        assert!(config.add_subscription(subscription("https://a", "x")));
        assert!(!config.add_subscription(subscription("https://a", "x")));
        // same endpoint, different key: distinct tuple
        assert!(config.add_subscription(subscription("https://a", "y")));
        assert_eq!(config.subscriptions.len(), 2);

        assert!(config.remove_subscription(&subscription("https://a", "x")));
        assert!(!config.remove_subscription(&subscription("https://a", "x")));
        assert_eq!(config.subscriptions, vec![subscription("https://a", "y")]);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = FeedConfig::generate();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(&config.secret));
    }

    #[test]
    fn test_reads_capitalized_subscriptions_key() {
        let json = r#"{"secret":"s","Subscriptions":[{"endpoint":"e","keys":{"auth":"a","p256dh":"p"}}]}"#;
        let config: FeedConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.subscriptions.len(), 1);
        assert!(config.pin.is_none());
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let mut config = FeedConfig::generate();
        config.set_pin_at("0042", Utc::now()).unwrap();
        config.add_subscription(subscription("https://a", "x"));
        config.write(dir.path()).await.unwrap();

        assert!(!dir.path().join(CONFIG_STAGING_FILE_NAME).exists());
        let loaded = FeedConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_missing_config_and_legacy_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = FeedConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, FeedConfigError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), b"{not json").unwrap();
        let err = FeedConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, FeedConfigError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_legacy_migration() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LEGACY_SECRET_FILE_NAME), "legacy-secret").unwrap();
        std::fs::write(dir.path().join(LEGACY_PIN_FILE_NAME), "9876").unwrap();

        let config = FeedConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.secret, "legacy-secret");
        assert_eq!(config.pin.as_ref().map(|p| p.pin.as_str()), Some("9876"));

        assert!(!dir.path().join(LEGACY_SECRET_FILE_NAME).exists());
        assert!(!dir.path().join(LEGACY_PIN_FILE_NAME).exists());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());

        // second load reads the migrated file
        let again = FeedConfig::load(dir.path()).await.unwrap();
        assert_eq!(again, config);
    }
}
