//! Entry point for everything that turns a feed name into a [`Feed`].
//!
//! Network-facing code must go through [`FeedManager::resolve_authorized`] or
//! [`FeedManager::open_or_create`]; [`FeedManager::resolve`] skips the
//! credential check and is meant for trusted callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::feed::{Feed, FeedError};
use crate::hub::NotificationHub;
use crate::push::PushNotifier;

/// Server-wide settings file kept next to the feed directories.
pub const SERVER_CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Clone)]
pub struct FeedManager {
    root: PathBuf,
    hub: NotificationHub,
    push: Option<PushNotifier>,
    locks: Arc<parking_lot::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl std::fmt::Debug for FeedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedManager")
            .field("root", &self.root)
            .field("push", &self.push.is_some())
            .finish_non_exhaustive()
    }
}

/// Whether a result of [`FeedManager::open_or_create`] is a brand new feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    Created,
    Existing,
}

impl FeedManager {
    pub fn new(root: impl Into<PathBuf>, hub: NotificationHub, push: Option<PushNotifier>) -> Self {
        Self {
            root: root.into(),
            hub,
            push,
            locks: Default::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn push(&self) -> Option<&PushNotifier> {
        self.push.as_ref()
    }

    /// A feed name is a single directory component directly under the root.
    pub fn validate_name(name: &str) -> Result<(), FeedError> {
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
            || name == SERVER_CONFIG_FILE_NAME;
        if invalid {
            return Err(FeedError::InvalidFeedName(name.to_string()));
        }
        Ok(())
    }

    fn feed_path(&self, name: &str) -> Result<PathBuf, FeedError> {
        Self::validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    fn wire(&self, feed: Feed) -> Feed {
        let lock = self.lock_for(feed.path());
        feed.with_lock(lock)
            .with_hub(self.hub.clone())
            .with_push(self.push.clone())
    }

    /// Open a feed without checking any credential.
    pub async fn resolve(&self, name: &str) -> Result<Feed, FeedError> {
        let path = self.feed_path(name)?;
        let feed = Feed::open(path).await?;
        Ok(self.wire(feed))
    }

    pub async fn resolve_authorized(&self, name: &str, credential: &str) -> Result<Feed, FeedError> {
        let feed = self.resolve(name).await?;
        feed.is_authorized(credential)?;
        Ok(feed)
    }

    pub async fn create(&self, name: &str) -> Result<Feed, FeedError> {
        let path = self.feed_path(name)?;
        let feed = Feed::create(path).await?;
        tracing::info!(feed = name, "feed created");
        Ok(self.wire(feed))
    }

    /// Create the feed if it does not exist yet, no credential needed. An
    /// existing feed (including one a concurrent caller just created) must
    /// authorize `credential`.
    pub async fn open_or_create(&self, name: &str, credential: &str) -> Result<(Feed, Opened), FeedError> {
        match self.resolve(name).await {
            Ok(feed) => {
                feed.is_authorized(credential)?;
                Ok((feed, Opened::Existing))
            }
            Err(FeedError::FeedNotFound(_)) => match self.create(name).await {
                Ok(feed) => Ok((feed, Opened::Created)),
                Err(FeedError::AlreadyExists(_)) => {
                    let feed = self.resolve_authorized(name, credential).await?;
                    Ok((feed, Opened::Existing))
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}
