//! Integration tests for secret and PIN authorization

mod common;

use ::common::prelude::*;
use chrono::{TimeDelta, Utc};

#[tokio::test]
async fn test_resolve_authorized_with_secret() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();
    let secret = feed.secret().to_string();

    assert!(manager.resolve_authorized("demo", &secret).await.is_ok());
    assert!(matches!(
        manager.resolve_authorized("demo", "").await,
        Err(FeedError::Unauthorized)
    ));
    assert!(matches!(
        manager.resolve_authorized("demo", "not-the-secret").await,
        Err(FeedError::IncorrectSecret)
    ));
    assert!(matches!(
        manager.resolve_authorized("missing", &secret).await,
        Err(FeedError::FeedNotFound(_))
    ));
}

#[tokio::test]
async fn test_pin_opens_second_session() {
    let (manager, _temp) = common::setup_manager();
    let mut feed = manager.create("demo").await.unwrap();
    feed.set_pin("1234").await.unwrap();

    let session = manager.resolve_authorized("demo", "1234").await.unwrap();
    assert_eq!(session.secret(), feed.secret());

    // five characters is a secret check, not a pin check
    let err = manager.resolve_authorized("demo", "12345").await.unwrap_err();
    assert!(matches!(err, FeedError::IncorrectSecret));
    assert_eq!(err.kind(), FeedErrorKind::Forbidden);
}

#[tokio::test]
async fn test_pin_expiry_boundary() {
    let (manager, _temp) = common::setup_manager();
    let mut feed = manager.create("demo").await.unwrap();
    let t = Utc::now();
    feed.set_pin_at("4242", t).await.unwrap();

    let session = manager.resolve("demo").await.unwrap();
    assert!(session
        .is_authorized_at("4242", t + TimeDelta::seconds(119))
        .is_ok());
    assert!(matches!(
        session.is_authorized_at("4242", t + TimeDelta::seconds(121)),
        Err(FeedError::PinExpired)
    ));
}

#[tokio::test]
async fn test_secret_never_matches_as_pin() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();
    let prefix: String = feed.secret().chars().take(4).collect();

    assert!(matches!(
        feed.is_authorized(&prefix),
        Err(FeedError::NoPinConfigured)
    ));
}

#[tokio::test]
async fn test_open_or_create() {
    let (manager, _temp) = common::setup_manager();

    let (feed, opened) = manager.open_or_create("fresh", "").await.unwrap();
    assert_eq!(opened, Opened::Created);
    let secret = feed.secret().to_string();

    assert!(matches!(
        manager.open_or_create("fresh", "").await,
        Err(FeedError::Unauthorized)
    ));
    assert!(matches!(
        manager.open_or_create("fresh", "wrong").await,
        Err(FeedError::IncorrectSecret)
    ));

    let (again, opened) = manager.open_or_create("fresh", &secret).await.unwrap();
    assert_eq!(opened, Opened::Existing);
    assert_eq!(again.secret(), secret);
}
