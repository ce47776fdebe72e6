//! Integration tests for hub broadcasts and push notifications driven by store mutations

mod common;

use std::time::Duration;

use ::common::prelude::*;

#[tokio::test]
async fn test_add_and_remove_are_broadcast_in_order() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();
    let mut listener = manager.hub().listen("demo");

    let name = common::add_text(&feed, "hello").await;
    feed.remove_item(&name, true).await.unwrap();

    match listener.recv().await {
        Some(FeedEvent::Add { item }) => {
            assert_eq!(item.name, name);
            assert_eq!(item.feed.name, "demo");
        }
        other => panic!("expected add, got {other:?}"),
    }
    match listener.recv().await {
        Some(FeedEvent::Remove { item }) => assert_eq!(item.name, name),
        other => panic!("expected remove, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remove_event_carries_stored_name() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();
    let name = common::add_text(&feed, "hello").await;

    let mut listener = manager.hub().listen("demo");
    feed.remove_item(&format!("./{name}"), true).await.unwrap();

    match listener.try_recv() {
        Some(FeedEvent::Remove { item }) => assert_eq!(item.name, name),
        other => panic!("expected remove, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remove_without_notify_is_silent() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();
    let name = common::add_text(&feed, "hello").await;

    let mut listener = manager.hub().listen("demo");
    feed.remove_item(&name, false).await.unwrap();
    assert_eq!(listener.try_recv(), None);
}

#[tokio::test]
async fn test_empty_sends_single_event() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();
    common::add_text(&feed, "a").await;
    common::add_text(&feed, "b").await;

    let mut listener = manager.hub().listen("demo");
    feed.empty().await.unwrap();

    assert_eq!(listener.try_recv(), Some(FeedEvent::Empty));
    assert_eq!(listener.try_recv(), None);
}

#[tokio::test]
async fn test_other_feeds_hear_nothing() {
    let (manager, _temp) = common::setup_manager();
    let demo = manager.create("demo").await.unwrap();
    manager.create("other").await.unwrap();
    let mut other = manager.hub().listen("other");

    common::add_text(&demo, "hello").await;
    assert_eq!(other.try_recv(), None);
}

#[tokio::test]
async fn test_dropped_listener_is_unregistered() {
    let (manager, _temp) = common::setup_manager();
    let feed = manager.create("demo").await.unwrap();

    let listener = manager.hub().listen("demo");
    assert_eq!(manager.hub().connection_count("demo"), 1);
    drop(listener);
    assert_eq!(manager.hub().connection_count("demo"), 0);

    // still works with nobody listening
    common::add_text(&feed, "hello").await;
}

#[tokio::test]
async fn test_add_pushes_to_every_subscription() {
    let (manager, transport, _temp) = common::setup_manager_with_push();
    let mut feed = manager.create("demo").await.unwrap();
    feed.add_subscription(common::subscription("https://push/a"))
        .await
        .unwrap();
    feed.add_subscription(common::subscription("https://push/b"))
        .await
        .unwrap();

    let public = feed.public().await.unwrap();
    assert!(!public.vapid_public_key.is_empty());

    common::add_text(&feed, "hello").await;

    // delivery runs in the background
    for _ in 0..50 {
        if transport.sent.lock().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let sent = transport.sent.lock();
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|(_, payload)| payload == "New item posted to feed demo"));
}
