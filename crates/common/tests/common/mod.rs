//! Shared helpers for feed store integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::prelude::*;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Push transport that records what it was asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl PushTransport for RecordingTransport {
    async fn send(
        &self,
        _settings: &NotificationSettings,
        subscription: &Subscription,
        payload: &[u8],
        _ttl: u32,
    ) -> Result<(), PushError> {
        self.sent.lock().push((
            subscription.endpoint.clone(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }
}

/// A manager over a fresh data root, without push.
pub fn setup_manager() -> (FeedManager, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let manager = FeedManager::new(temp_dir.path(), NotificationHub::new(), None);
    (manager, temp_dir)
}

/// A manager whose push notifications land in the returned transport.
pub fn setup_manager_with_push() -> (FeedManager, Arc<RecordingTransport>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let notifier = PushNotifier::new(NotificationSettings::generate(), transport.clone());
    let manager = FeedManager::new(temp_dir.path(), NotificationHub::new(), Some(notifier));
    (manager, transport, temp_dir)
}

pub fn subscription(endpoint: &str) -> Subscription {
    Subscription {
        endpoint: endpoint.to_string(),
        keys: SubscriptionKeys {
            auth: "auth".to_string(),
            p256dh: "p256dh".to_string(),
        },
    }
}

/// Add a text item and return its name.
pub async fn add_text(feed: &Feed, body: &str) -> String {
    feed.add_item(Some("text/plain"), None, body.as_bytes(), 1024 * 1024)
        .await
        .unwrap()
        .name
}
