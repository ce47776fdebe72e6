/**
 * Feeds: named content containers on the local
 *  filesystem. Listing, reading, adding and
 *  removing items, plus secret/PIN checks.
 */
pub mod feed;
/**
 * Per-feed persisted settings: the long-lived
 *  secret, the short-lived PIN and the push
 *  subscriptions.
 */
pub mod feed_config;
/**
 * Resolves feed names against the data root and
 *  hands out feeds wired to the shared hub and
 *  push settings.
 */
pub mod feed_manager;
/**
 * Registry of live viewer connections per feed,
 *  fanning out add/remove events in order.
 */
pub mod hub;
/**
 * Lexical guard resolving caller-supplied item
 *  names inside a feed directory.
 */
pub mod path_guard;
/**
 * Best-effort browser push notifications on
 *  item add, plus VAPID key handling.
 */
pub mod push;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::feed::{
        Feed, FeedError, FeedErrorKind, FeedItem, FeedItemKind, FeedRef, PublicFeed,
    };
    pub use crate::feed_config::{FeedConfig, FeedConfigError, Pin, Subscription, SubscriptionKeys};
    pub use crate::feed_manager::{FeedManager, Opened};
    pub use crate::hub::{ConnectionId, FeedEvent, Listener, NotificationHub};
    pub use crate::push::{NotificationSettings, PushError, PushNotifier, PushTransport};
    pub use crate::version::build_info;
}
