//! Web push delivery over HTTP.
//!
//! Payload encryption (RFC 8291) and VAPID signing (RFC 8292) come from the
//! `web-push` crate; the request itself goes out through `reqwest` so one
//! pooled client serves every subscription.

use common::prelude::{NotificationSettings, PushError, PushTransport, Subscription};
use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

#[derive(Debug, Clone, Default)]
pub struct WebPushTransport {
    client: reqwest::Client,
}

impl WebPushTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        settings: &NotificationSettings,
        subscription: &Subscription,
        payload: &[u8],
        ttl: u32,
    ) -> Result<(), PushError> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature = VapidSignatureBuilder::from_base64(&settings.vapid_private_key, &info)
            .map_err(|e| PushError::InvalidKey(e.to_string()))?;
        signature.add_claim("sub", settings.subject.as_str());
        let signature = signature
            .build()
            .map_err(|e| PushError::Message(e.to_string()))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(ttl);
        let message = builder
            .build()
            .map_err(|e| PushError::Message(e.to_string()))?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());
        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");
            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }
            request = request.body(push_payload.content);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushError::Delivery(e.to_string()))?;
        let status = response.status();
        tracing::debug!(endpoint = %subscription.endpoint, status = status.as_u16(), "push service responded");

        if status.is_success() {
            Ok(())
        } else {
            Err(PushError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_is_accepted_by_signer() {
        let settings = NotificationSettings::generate();
        let info = SubscriptionInfo::new(
            "https://push.example.com/test",
            "BLMbF9ffKBiWQLCKvTHb6LO8Nb6dcUh6TItC455vu2kElga6PQvUmaFyCdykxY2nOSSL3yKgfbmFLRTUaGv4yV8",
            "xS03Fi5ErfTNH_l9WHE9Ig",
        );
        assert!(VapidSignatureBuilder::from_base64(&settings.vapid_private_key, &info).is_ok());
    }
}
