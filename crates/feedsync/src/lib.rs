//! feedsync - keeps a watch inventory feed in sync with sales channels.
//!
//! Each cycle compares the authoritative feed with a local mirror of what a
//! channel holds, refuses obviously destructive change sets, and applies the
//! rest one listing at a time with retry and backoff.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//! - `reqwest` - HTTP transport for the REST channel, HTTP feed and webhook alerts.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedsync::{connect_and_migrate, DbMirrorStore, JsonFeedSource, Reconciler};
//!
//! let db = Arc::new(connect_and_migrate("sqlite://feedsync.db?mode=rwc").await?);
//! let reconciler = Reconciler::builder()
//!     .channel(channel)
//!     .feed(Arc::new(JsonFeedSource::file("inventory.json")))
//!     .store(Arc::new(DbMirrorStore::new(db)))
//!     .build()?;
//!
//! let summary = reconciler.run_cycle().await?;
//! ```

pub mod alert;
pub mod channel;
pub mod db;
pub mod entity;
pub mod feed;
pub mod http;
pub mod mirror;
pub mod retry;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use alert::{Alert, AlertError, Alerter, FanoutAlerter, Severity, TracingAlerter, WebhookAlerter};
pub use channel::{
    ApiRateLimiter, ChannelAdapter, ChannelError, ErrorClass, RateLimitedChannel,
    RemoteListingRef, RemoteStatus, RestChannel, rate_limits,
};
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use feed::{CanonicalItem, FeedError, FeedSource, JsonFeedSource, StaticFeed};
pub use mirror::{
    CycleRecord, DbMirrorStore, MemoryMirrorStore, MirrorError, MirrorRecord, MirrorSnapshot,
    MirrorStore,
};
pub use retry::{Pacing, RetryPolicy, Sleeper, TokioSleeper};
pub use sync::{
    ChangeSet, CycleOutcome, CycleSummary, DefaultStatusPolicy, ExecutionWindow, Plan,
    ReconcileError, Reconciler, Retention, SafetyThresholds, StatusPolicy, SyncOptions,
};
