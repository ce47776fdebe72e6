//! Browser push notifications.
//!
//! Push is strictly best effort: nothing here ever fails the request that
//! triggered it. The actual RFC 8291 encryption and delivery live behind
//! [`PushTransport`] so the store does not depend on an HTTP client.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};

use crate::feed_config::Subscription;

/// Seconds a push service should hold an undelivered message.
pub const PUSH_TTL_SECS: u32 = 30;

pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:ybfeed@tynsoe.org";

fn default_subject() -> String {
    DEFAULT_VAPID_SUBJECT.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("invalid VAPID key: {0}")]
    InvalidKey(String),
    #[error("unable to build push message: {0}")]
    Message(String),
    #[error("push delivery failed: {0}")]
    Delivery(String),
    #[error("push service rejected message (HTTP {status})")]
    Rejected { status: u16 },
}

/// Server wide VAPID key pair.
///
/// The private key is the raw 32 byte P-256 scalar and the public key the
/// 65 byte uncompressed SEC1 point, both base64url without padding. The
/// public key is what browsers pass as `applicationServerKey`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub vapid_public_key: String,
    pub vapid_private_key: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl std::fmt::Debug for NotificationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSettings")
            .field("vapid_public_key", &self.vapid_public_key)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl NotificationSettings {
    pub fn generate() -> Self {
        // rejection sample: a handful of 32 byte strings are not valid scalars
        let secret = loop {
            let bytes: [u8; 32] = rand::random();
            if let Ok(secret) = p256::SecretKey::from_slice(&bytes) {
                break secret;
            }
        };
        let public = secret.public_key().to_encoded_point(false);

        Self {
            vapid_public_key: BASE64URL.encode(public.as_bytes()),
            vapid_private_key: BASE64URL.encode(secret.to_bytes().as_slice()),
            subject: default_subject(),
        }
    }

    /// Check that both keys decode and that they belong together.
    pub fn validate(&self) -> Result<(), PushError> {
        let private = BASE64URL
            .decode(&self.vapid_private_key)
            .map_err(|e| PushError::InvalidKey(format!("private key: {e}")))?;
        let secret = p256::SecretKey::from_slice(&private)
            .map_err(|_| PushError::InvalidKey("private key is not a P-256 scalar".into()))?;

        let public = BASE64URL
            .decode(&self.vapid_public_key)
            .map_err(|e| PushError::InvalidKey(format!("public key: {e}")))?;
        if public.len() != 65 || public[0] != 0x04 {
            return Err(PushError::InvalidKey(
                "public key must be an uncompressed P-256 point".into(),
            ));
        }
        if secret.public_key().to_encoded_point(false).as_bytes() != public.as_slice() {
            return Err(PushError::InvalidKey(
                "public key does not match private key".into(),
            ));
        }
        Ok(())
    }
}

/// Delivers one encrypted message to one subscription.
#[async_trait::async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        settings: &NotificationSettings,
        subscription: &Subscription,
        payload: &[u8],
        ttl: u32,
    ) -> Result<(), PushError>;
}

#[derive(Clone)]
pub struct PushNotifier {
    settings: NotificationSettings,
    transport: Arc<dyn PushTransport>,
}

impl std::fmt::Debug for PushNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushNotifier")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PushNotifier {
    pub fn new(settings: NotificationSettings, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    pub fn message_for(feed_name: &str) -> String {
        format!("New item posted to feed {}", feed_name)
    }

    /// Send the "new item" message to every subscription, one at a time.
    /// Failures are logged and skipped. Returns the number delivered.
    pub async fn notify(&self, feed_name: &str, subscriptions: &[Subscription]) -> usize {
        let payload = Self::message_for(feed_name);
        let mut delivered = 0;

        for subscription in subscriptions {
            tracing::debug!(feed = feed_name, endpoint = %subscription.endpoint, "sending push notification");
            match self
                .transport
                .send(&self.settings, subscription, payload.as_bytes(), PUSH_TTL_SECS)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(feed = feed_name, endpoint = %subscription.endpoint, error = %e, "push notification failed");
                }
            }
        }
        delivered
    }

    /// Fire and forget variant of [`PushNotifier::notify`].
    pub fn notify_in_background(&self, feed_name: &str, subscriptions: Vec<Subscription>) {
        if subscriptions.is_empty() {
            return;
        }
        let notifier = self.clone();
        let feed_name = feed_name.to_string();
        tokio::spawn(async move {
            notifier.notify(&feed_name, &subscriptions).await;
        });
    }
}
