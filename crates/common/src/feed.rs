//! A feed is a directory under the data root.
//!
//! ```text
//! data/
//! └── demo/
//!     ├── config.json        secret, pin, push subscriptions
//!     ├── Pasted Text.txt
//!     ├── Pasted Text 1.txt
//!     └── Pasted Image.png
//! ```
//!
//! Every non-reserved regular file in the directory is an item. Item names
//! supplied by callers always go through [`path_guard::resolve`] before the
//! filesystem is touched.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::feed_config::{
    write_private_file, FeedConfig, FeedConfigError, PinError, Subscription,
    CONFIG_FILE_NAME, CONFIG_STAGING_FILE_NAME, LEGACY_PIN_FILE_NAME, LEGACY_SECRET_FILE_NAME,
    PIN_LENGTH,
};
use crate::hub::{FeedEvent, NotificationHub};
use crate::path_guard::{self, PathTraversal};
use crate::push::PushNotifier;

/// File names inside a feed directory that are never items.
pub const RESERVED_NAMES: [&str; 4] = [
    CONFIG_FILE_NAME,
    CONFIG_STAGING_FILE_NAME,
    LEGACY_SECRET_FILE_NAME,
    LEGACY_PIN_FILE_NAME,
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Broad category of an item, derived from its extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedItemKind {
    Text,
    Image,
    Binary,
}

impl FeedItemKind {
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(".txt") {
            FeedItemKind::Text
        } else if name.ends_with(".png") || name.ends_with(".jpg") {
            FeedItemKind::Image
        } else {
            FeedItemKind::Binary
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            FeedItemKind::Text => 0,
            FeedItemKind::Image => 1,
            FeedItemKind::Binary => 2,
        }
    }
}

// the web client switches on the numeric value
impl Serialize for FeedItemKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for FeedItemKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            0 => Ok(FeedItemKind::Text),
            1 => Ok(FeedItemKind::Image),
            2 => Ok(FeedItemKind::Binary),
            other => Err(serde::de::Error::custom(format!(
                "unknown item type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub name: String,
    /// Last modification time of the stored file.
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: FeedItemKind,
    pub feed: FeedRef,
}

/// Snapshot handed to an authorized client. The secret is included on
/// purpose: the browser keeps it as its session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicFeed {
    pub name: String,
    pub items: Vec<FeedItem>,
    pub secret: String,
    #[serde(rename = "vapidpublickey")]
    pub vapid_public_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    InvalidInput,
    ResourceExceeded,
    StoreFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed not found: {0}")]
    FeedNotFound(String),
    #[error("feed already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid feed name: {0:?}")]
    InvalidFeedName(String),
    #[error("feed item not found: {0}")]
    ItemNotFound(String),
    #[error("invalid item name: {0}")]
    InvalidItem(String),
    #[error(transparent)]
    PathTraversal(#[from] PathTraversal),
    #[error("missing credential")]
    Unauthorized,
    #[error("invalid secret")]
    IncorrectSecret,
    #[error("feed pin incorrect")]
    PinIncorrect,
    #[error("feed pin expired")]
    PinExpired,
    #[error("feed has no pin configured")]
    NoPinConfigured,
    #[error("feed pin must be {} characters", PIN_LENGTH)]
    InvalidPinLength,
    #[error("invalid content-type: {0}")]
    InvalidContentType(String),
    #[error("max body size exceeded: {limit}")]
    MaxSizeExceeded { limit: u64 },
    #[error("feed item is empty")]
    EmptyContent,
    #[error("error while reading new item")]
    ReadFailed(#[source] io::Error),
    #[error("unable to read feed content")]
    StoreUnreadable(#[source] io::Error),
    #[error("unable to read item info: {name}")]
    ItemInfoUnavailable {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("error while writing new item: {}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] FeedConfigError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<PinError> for FeedError {
    fn from(err: PinError) -> Self {
        match err {
            PinError::Expired => FeedError::PinExpired,
            PinError::Incorrect => FeedError::PinIncorrect,
            PinError::NotConfigured => FeedError::NoPinConfigured,
            PinError::InvalidLength => FeedError::InvalidPinLength,
        }
    }
}

impl FeedError {
    pub fn kind(&self) -> FeedErrorKind {
        match self {
            Self::FeedNotFound(_) | Self::ItemNotFound(_) => FeedErrorKind::NotFound,
            Self::Unauthorized => FeedErrorKind::Unauthorized,
            Self::IncorrectSecret | Self::PinIncorrect | Self::PinExpired | Self::NoPinConfigured => {
                FeedErrorKind::Forbidden
            }
            Self::AlreadyExists(_) => FeedErrorKind::Conflict,
            Self::InvalidFeedName(_)
            | Self::InvalidItem(_)
            | Self::PathTraversal(_)
            | Self::InvalidPinLength
            | Self::InvalidContentType(_)
            | Self::EmptyContent
            | Self::ReadFailed(_) => FeedErrorKind::InvalidInput,
            Self::MaxSizeExceeded { .. } => FeedErrorKind::ResourceExceeded,
            Self::StoreUnreadable(_)
            | Self::ItemInfoUnavailable { .. }
            | Self::WriteFailed { .. }
            | Self::Config(_)
            | Self::Io(_) => FeedErrorKind::StoreFailure,
        }
    }
}

pub struct Feed {
    path: PathBuf,
    name: String,
    config: FeedConfig,
    /// Serializes name allocation and config read-modify-write for this
    /// directory. Shared by every `Feed` handle the manager opens on it.
    lock: Arc<Mutex<()>>,
    hub: Option<NotificationHub>,
    push: Option<PushNotifier>,
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn feed_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}

impl Feed {
    fn from_parts(path: PathBuf, config: FeedConfig) -> Self {
        Self {
            name: feed_name(&path),
            path,
            config,
            lock: Arc::new(Mutex::new(())),
            hub: None,
            push: None,
        }
    }

    /// Create the feed directory with a fresh config. The directory and its
    /// config appear together: both are staged under a hidden sibling name
    /// and renamed into place.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let path = path.into();
        let name = feed_name(&path);
        tracing::info!(feed = %name, "creating new feed");

        if tokio::fs::try_exists(&path).await? {
            return Err(FeedError::AlreadyExists(name));
        }
        let parent = path
            .parent()
            .ok_or_else(|| FeedError::InvalidFeedName(name.clone()))?;

        let staging = parent.join(format!(".{}.{}", name, Uuid::new_v4().simple()));
        create_private_dir(&staging).await?;

        let config = FeedConfig::generate();
        if let Err(e) = config.write(&staging).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e.into());
        }

        // renaming onto a populated directory fails, so a concurrent creator loses here
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(FeedError::AlreadyExists(name));
            }
            return Err(FeedError::Io(e));
        }

        Ok(Self::from_parts(path, config))
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let path = path.into();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(FeedError::FeedNotFound(feed_name(&path))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FeedError::FeedNotFound(feed_name(&path)))
            }
            Err(e) => return Err(FeedError::Io(e)),
        }

        let config = FeedConfig::load(&path).await?;
        Ok(Self::from_parts(path, config))
    }

    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_hub(mut self, hub: NotificationHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_push(mut self, push: Option<PushNotifier>) -> Self {
        self.push = push;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn secret(&self) -> &str {
        &self.config.secret
    }

    pub fn vapid_public_key(&self) -> Option<&str> {
        self.push
            .as_ref()
            .map(|p| p.settings().vapid_public_key.as_str())
    }

    pub async fn public(&self) -> Result<PublicFeed, FeedError> {
        Ok(PublicFeed {
            name: self.name.clone(),
            items: self.list_public_items().await?,
            secret: self.config.secret.clone(),
            vapid_public_key: self.vapid_public_key().unwrap_or_default().to_string(),
        })
    }

    fn item(&self, name: String, meta: &std::fs::Metadata) -> Result<FeedItem, FeedError> {
        let date = meta
            .modified()
            .map_err(|source| FeedError::ItemInfoUnavailable {
                name: name.clone(),
                source,
            })?;
        Ok(FeedItem {
            kind: FeedItemKind::from_name(&name),
            name,
            date: date.into(),
            feed: FeedRef {
                name: self.name.clone(),
            },
        })
    }

    /// Items sorted newest first.
    pub async fn list_public_items(&self) -> Result<Vec<FeedItem>, FeedError> {
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(FeedError::StoreUnreadable)?;

        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(FeedError::StoreUnreadable)?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_reserved(&name) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // removed between the listing and the stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(FeedError::ItemInfoUnavailable { name, source }),
            };
            if !meta.is_file() {
                continue;
            }
            items.push(self.item(name, &meta)?);
        }

        items.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(items)
    }

    /// Resolve a caller-supplied item name, refusing reserved files.
    fn item_path(&self, name: &str) -> Result<PathBuf, FeedError> {
        let path = path_guard::resolve(&self.path, name)?;
        let reserved = path.parent() == Some(self.path.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_reserved);
        if reserved {
            return Err(FeedError::InvalidItem(name.to_string()));
        }
        Ok(path)
    }

    /// Metadata of a single item.
    pub async fn item_info(&self, name: &str) -> Result<FeedItem, FeedError> {
        let path = self.item_path(name)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(FeedError::ItemNotFound(name.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FeedError::ItemNotFound(name.to_string()))
            }
            Err(source) => {
                return Err(FeedError::ItemInfoUnavailable {
                    name: name.to_string(),
                    source,
                })
            }
        };
        let stored = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| FeedError::ItemNotFound(name.to_string()))?;
        self.item(stored, &meta)
    }

    pub async fn get_item(&self, name: &str) -> Result<Vec<u8>, FeedError> {
        tracing::debug!(feed = %self.name, item = name, "getting item");
        let path = self.item_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FeedError::ItemNotFound(name.to_string()))
            }
            Err(e) => Err(FeedError::StoreUnreadable(e)),
        }
    }

    /// Store a new item and announce it.
    ///
    /// Known content types get a generic name (`Pasted Text.txt`); anything
    /// else is named after `suggested_filename`. Reading stops one byte past
    /// `max_size`.
    pub async fn add_item<R>(
        &self,
        content_type: Option<&str>,
        suggested_filename: Option<&str>,
        reader: R,
        max_size: u64,
    ) -> Result<FeedItem, FeedError>
    where
        R: AsyncRead + Unpin,
    {
        tracing::debug!(
            feed = %self.name,
            content_type = content_type.unwrap_or(""),
            filename = suggested_filename.unwrap_or(""),
            "adding item"
        );
        let (template, extension) = item_template(content_type, suggested_filename)?;

        let mut content = Vec::new();
        reader
            .take(max_size.saturating_add(1))
            .read_to_end(&mut content)
            .await
            .map_err(FeedError::ReadFailed)?;
        if content.len() as u64 > max_size {
            return Err(FeedError::MaxSizeExceeded { limit: max_size });
        }
        if content.is_empty() {
            return Err(FeedError::EmptyContent);
        }

        let name = {
            let _guard = self.lock.lock().await;
            let name = self.allocate_name(&template, extension.as_deref()).await?;
            let path = self.path.join(&name);
            write_private_file(&path, &content, true)
                .await
                .map_err(|source| FeedError::WriteFailed { path, source })?;
            name
        };

        let item = self.item_info(&name).await?;
        self.broadcast(FeedEvent::Add { item: item.clone() });
        if let Some(push) = &self.push {
            push.notify_in_background(&self.name, self.config.subscriptions.clone());
        }

        tracing::debug!(feed = %self.name, item = %name, "added item");
        Ok(item)
    }

    /// First free `{template}[ {index}][.{ext}]`. A stem is taken when any
    /// file is named exactly `stem` or starts with `stem.`.
    async fn allocate_name(&self, template: &str, extension: Option<&str>) -> Result<String, FeedError> {
        let mut existing = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(FeedError::StoreUnreadable)?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(FeedError::StoreUnreadable)?
        {
            if let Ok(name) = entry.file_name().into_string() {
                existing.push(name);
            }
        }

        let mut index = 0usize;
        loop {
            let stem = if index == 0 {
                template.to_string()
            } else {
                format!("{} {}", template, index)
            };
            let name = match extension {
                Some(ext) => format!("{}.{}", stem, ext),
                None => stem.clone(),
            };

            let prefix = format!("{}.", stem);
            let taken = existing
                .iter()
                .any(|n| n == &stem || n.starts_with(&prefix));
            if !taken && !is_reserved(&name) {
                return Ok(name);
            }
            index += 1;
        }
    }

    pub async fn remove_item(&self, name: &str, notify: bool) -> Result<(), FeedError> {
        tracing::debug!(feed = %self.name, item = name, "removing item");
        let path = self.item_path(name)?;
        // metadata is gone once the file is
        let item = self.item_info(name).await?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FeedError::ItemNotFound(name.to_string()))
            }
            Err(e) => return Err(FeedError::Io(e)),
        }

        if notify {
            self.broadcast(FeedEvent::Remove { item });
        }
        Ok(())
    }

    /// Remove every item, then send a single `empty` event.
    pub async fn empty(&self) -> Result<usize, FeedError> {
        let items = self.list_public_items().await?;
        let mut removed = 0;
        for item in &items {
            match self.remove_item(&item.name, false).await {
                Ok(()) => removed += 1,
                // a concurrent remove or empty got there first
                Err(FeedError::ItemNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.broadcast(FeedEvent::Empty);
        tracing::debug!(feed = %self.name, removed, "emptied feed");
        Ok(removed)
    }

    fn broadcast(&self, event: FeedEvent) {
        if let Some(hub) = &self.hub {
            hub.broadcast(&self.name, &event);
        }
    }

    /// Reload, mutate and persist the config while holding the feed lock.
    async fn update_config<T, F>(&mut self, update: F) -> Result<T, FeedError>
    where
        F: FnOnce(&mut FeedConfig) -> Result<T, FeedError>,
    {
        let _guard = self.lock.lock().await;
        let mut config = FeedConfig::load(&self.path).await?;
        let result = update(&mut config)?;
        config.write(&self.path).await?;
        self.config = config;
        Ok(result)
    }

    pub async fn set_pin(&mut self, value: &str) -> Result<(), FeedError> {
        self.set_pin_at(value, Utc::now()).await
    }

    pub async fn set_pin_at(&mut self, value: &str, now: DateTime<Utc>) -> Result<(), FeedError> {
        self.update_config(|config| config.set_pin_at(value, now).map_err(FeedError::from))
            .await?;
        tracing::debug!(feed = %self.name, "pin set");
        Ok(())
    }

    /// Returns `false` if the subscription was already present.
    pub async fn add_subscription(&mut self, subscription: Subscription) -> Result<bool, FeedError> {
        self.update_config(|config| Ok(config.add_subscription(subscription)))
            .await
    }

    /// Returns `false` if nothing matched.
    pub async fn remove_subscription(&mut self, subscription: &Subscription) -> Result<bool, FeedError> {
        self.update_config(|config| Ok(config.remove_subscription(subscription)))
            .await
    }

    pub fn is_authorized(&self, credential: &str) -> Result<(), FeedError> {
        self.is_authorized_at(credential, Utc::now())
    }

    /// Four character credentials are PINs, anything else must be the secret.
    pub fn is_authorized_at(&self, credential: &str, now: DateTime<Utc>) -> Result<(), FeedError> {
        if credential.is_empty() {
            return Err(FeedError::Unauthorized);
        }
        if credential.chars().count() == PIN_LENGTH {
            return self
                .config
                .check_pin_at(credential, now)
                .map_err(FeedError::from);
        }
        if credential != self.config.secret {
            tracing::debug!(feed = %self.name, "invalid secret");
            return Err(FeedError::IncorrectSecret);
        }
        Ok(())
    }
}

fn known_template(mime: &str) -> Option<(&'static str, &'static str)> {
    match mime {
        "image/png" => Some(("Pasted Image", "png")),
        "image/jpeg" => Some(("Pasted Image", "jpg")),
        "text/plain" => Some(("Pasted Text", "txt")),
        _ => None,
    }
}

/// `(template, extension)` for a new item.
fn item_template(
    content_type: Option<&str>,
    suggested_filename: Option<&str>,
) -> Result<(String, Option<String>), FeedError> {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    if let Some((template, ext)) = mime.as_deref().and_then(known_template) {
        return Ok((template.to_string(), Some(ext.to_string())));
    }

    let file_name = suggested_filename
        .map(Path::new)
        .and_then(Path::file_name)
        .and_then(|n| n.to_str());
    let Some(file_name) = file_name else {
        return Err(FeedError::InvalidContentType(
            content_type.unwrap_or_default().to_string(),
        ));
    };

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_string);
    Ok((stem, extension))
}
