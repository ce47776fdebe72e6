//! Feed credential extraction.
//!
//! A client proves access either with the feed secret or with a short-lived
//! PIN. Both travel the same way: a `secret` query parameter, or the
//! `Secret` cookie handed out by the feed GET endpoint. The query parameter
//! wins when both are present.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use http::request::Parts;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use url::Url;

pub const SECRET_COOKIE: &str = "Secret";
pub const SECRET_QUERY_PARAM: &str = "secret";

/// Roughly ten years.
const SECRET_COOKIE_LIFETIME: Duration = Duration::days(3650);

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_empty() { "<none>" } else { "<redacted>" };
        f.debug_tuple("Credential").field(&shown).finish()
    }
}

#[derive(Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_query = Query::<SecretQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.secret)
            .filter(|s| !s.is_empty());
        if let Some(secret) = from_query {
            return Ok(Credential(secret));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Credential(
            jar.get(SECRET_COOKIE)
                .map(|c| c.value().to_string())
                .unwrap_or_default(),
        ))
    }
}

/// The `Secret` cookie for `feed_name`, scoped to that feed's API path.
pub fn secret_cookie(feed_name: &str, secret: &str) -> Cookie<'static> {
    Cookie::build((SECRET_COOKIE, secret.to_string()))
        .path(feed_cookie_path(feed_name))
        .expires(OffsetDateTime::now_utc() + SECRET_COOKIE_LIFETIME)
        .build()
}

/// `/api/feeds/{feed_name}` with the name percent-encoded as one segment.
pub fn feed_cookie_path(feed_name: &str) -> String {
    let mut url = Url::parse("http://localhost/").expect("hardcoded URL must parse");
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.extend(["api", "feeds", feed_name]);
    }
    url.path().to_string()
}
