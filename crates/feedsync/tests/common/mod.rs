//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedsync::alert::{Alert, AlertError, Alerter, Severity};
use feedsync::channel::{self, ChannelAdapter, ChannelError, RemoteListingRef, RemoteStatus};
use feedsync::entity::sync_status::SyncStatus;
use feedsync::feed::{self, CanonicalItem, FeedError, FeedSource};
use feedsync::mirror::{MemoryMirrorStore, MirrorRecord};
use feedsync::retry::{Pacing, RetryPolicy, Sleeper};
use feedsync::sync::{ProgressCallback, Reconciler, SyncOptions, SyncProgress};

pub const CHANNEL: &str = "b2b";

#[derive(Debug, Clone)]
struct Listing {
    sku: Option<String>,
    status: RemoteStatus,
}

#[derive(Default)]
struct ChannelState {
    listings: BTreeMap<String, Listing>,
    next_id: u32,
    /// Queued errors keyed by `(operation, sku or remote id)`.
    failures: HashMap<(String, String), VecDeque<ChannelError>>,
    calls: Vec<String>,
}

/// In-memory channel that behaves like a marketplace catalog.
pub struct FakeChannel {
    enumerates: bool,
    state: Mutex<ChannelState>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self {
            enumerates: false,
            state: Mutex::new(ChannelState::default()),
        }
    }

    pub fn enumerating() -> Self {
        Self {
            enumerates: true,
            ..Self::new()
        }
    }

    /// Put a listing on the channel without going through the engine.
    pub fn seed(self, remote_id: &str, sku: Option<&str>, status: RemoteStatus) -> Self {
        self.set_status(remote_id, sku, status);
        self
    }

    pub fn set_status(&self, remote_id: &str, sku: Option<&str>, status: RemoteStatus) {
        self.state().listings.insert(
            remote_id.to_string(),
            Listing {
                sku: sku.map(str::to_string),
                status,
            },
        );
    }

    /// Fail the next call of `operation` on `key` (SKU for `create`,
    /// remote id otherwise).
    pub fn fail_next(&self, operation: &str, key: &str, err: ChannelError) {
        self.state()
            .failures
            .entry((operation.to_string(), key.to_string()))
            .or_default()
            .push_back(err);
    }

    pub fn status(&self, remote_id: &str) -> Option<RemoteStatus> {
        self.state().listings.get(remote_id).map(|l| l.status)
    }

    /// Remote id of the live listing for `sku`.
    pub fn live_id(&self, sku: &str) -> Option<String> {
        self.state()
            .listings
            .iter()
            .find(|(_, l)| l.sku.as_deref() == Some(sku) && l.status.is_live())
            .map(|(id, _)| id.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap()
    }

    fn begin(&self, operation: &str, key: &str) -> channel::Result<()> {
        let mut state = self.state();
        state.calls.push(format!("{operation} {key}"));
        match state
            .failures
            .get_mut(&(operation.to_string(), key.to_string()))
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChannelAdapter for FakeChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn create(&self, item: &CanonicalItem) -> channel::Result<String> {
        self.begin("create", &item.sku)?;
        let mut state = self.state();
        state.next_id += 1;
        let remote_id = format!("L-{}", state.next_id);
        state.listings.insert(
            remote_id.clone(),
            Listing {
                sku: Some(item.sku.clone()),
                status: RemoteStatus::Active,
            },
        );
        Ok(remote_id)
    }

    async fn update(&self, remote_id: &str, _item: &CanonicalItem) -> channel::Result<()> {
        self.begin("update", remote_id)?;
        if self.state().listings.contains_key(remote_id) {
            Ok(())
        } else {
            Err(ChannelError::not_found(remote_id))
        }
    }

    async fn deactivate(&self, remote_id: &str) -> channel::Result<()> {
        self.begin("deactivate", remote_id)?;
        let mut state = self.state();
        let Some(listing) = state.listings.get_mut(remote_id) else {
            return Err(ChannelError::not_found(remote_id));
        };
        if !listing.status.is_live() {
            return Err(ChannelError::AlreadyEnded {
                remote_id: remote_id.to_string(),
            });
        }
        listing.status = RemoteStatus::Inactive;
        Ok(())
    }

    async fn reactivate(&self, remote_id: &str, _item: &CanonicalItem) -> channel::Result<()> {
        self.begin("reactivate", remote_id)?;
        let mut state = self.state();
        let Some(listing) = state.listings.get_mut(remote_id) else {
            return Err(ChannelError::not_found(remote_id));
        };
        listing.status = RemoteStatus::Active;
        Ok(())
    }

    async fn list_active(&self) -> channel::Result<Option<Vec<RemoteListingRef>>> {
        if !self.enumerates {
            return Ok(None);
        }
        Ok(Some(
            self.state()
                .listings
                .iter()
                .map(|(id, l)| RemoteListingRef {
                    remote_id: id.clone(),
                    sku: l.sku.clone(),
                    remote_status: l.status,
                })
                .collect(),
        ))
    }
}

/// Feed whose snapshot can be swapped between cycles.
#[derive(Default)]
pub struct SwitchableFeed {
    snapshot: Mutex<Option<Vec<CanonicalItem>>>,
}

impl SwitchableFeed {
    pub fn new(items: Vec<CanonicalItem>) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(Some(items)),
        })
    }

    pub fn set(&self, items: Vec<CanonicalItem>) {
        *self.snapshot.lock().unwrap() = Some(items);
    }

    /// Make the next fetches fail.
    pub fn go_down(&self) {
        *self.snapshot.lock().unwrap() = None;
    }
}

#[async_trait]
impl FeedSource for SwitchableFeed {
    async fn fetch(&self) -> feed::Result<Vec<CanonicalItem>> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FeedError::unavailable("connection refused"))
    }
}

#[derive(Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.alerts()
            .iter()
            .filter(|a| a.severity == severity)
            .count()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn item(sku: &str) -> CanonicalItem {
    CanonicalItem::new(sku, "Available")
        .with_attr("brand", "Rolex")
        .with_attr("price", "10000")
}

pub fn published(sku: &str, remote_id: &str) -> MirrorRecord {
    let mut record = MirrorRecord::new(CHANNEL, sku);
    record.sync_status = SyncStatus::Published;
    record.remote_id = Some(remote_id.to_string());
    record.feed_status = "Available".into();
    record.attributes = item(sku).attributes;
    record
}

/// Options with no real waiting: fixed backoff, no pacing.
pub fn options() -> SyncOptions {
    SyncOptions {
        retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4))
            .with_jitter(false),
        pacing: Pacing::none(),
        ..SyncOptions::default()
    }
}

/// Everything a test needs to observe a reconciler.
pub struct Fixture {
    pub reconciler: Reconciler<FakeChannel>,
    pub feed: Arc<SwitchableFeed>,
    pub store: MemoryMirrorStore,
    pub alerter: Arc<RecordingAlerter>,
    pub sleeper: Arc<RecordingSleeper>,
    pub events: Arc<Mutex<Vec<SyncProgress>>>,
}

impl Fixture {
    pub fn new(
        channel: FakeChannel,
        feed: Vec<CanonicalItem>,
        mirror: Vec<MirrorRecord>,
        options: SyncOptions,
    ) -> Self {
        let feed = SwitchableFeed::new(feed);
        let store = MemoryMirrorStore::with_records(mirror);
        let alerter = Arc::new(RecordingAlerter::default());
        let sleeper = Arc::new(RecordingSleeper::default());
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&events);
        let progress: ProgressCallback = Box::new(move |event| {
            sink.lock().unwrap().push(event);
        });

        let reconciler = Reconciler::builder()
            .channel(channel)
            .feed(feed.clone())
            .store(Arc::new(store.clone()))
            .alerter(alerter.clone())
            .sleeper(sleeper.clone())
            .options(options)
            .progress(Arc::new(progress))
            .build()
            .expect("complete builder");

        Self {
            reconciler,
            feed,
            store,
            alerter,
            sleeper,
            events,
        }
    }

    pub fn channel(&self) -> &FakeChannel {
        self.reconciler.channel()
    }

    pub async fn mirror(&self) -> BTreeMap<String, MirrorRecord> {
        use feedsync::mirror::MirrorStore;
        self.store.load(CHANNEL).await.expect("load mirror")
    }

    pub fn events(&self) -> Vec<SyncProgress> {
        self.events.lock().unwrap().clone()
    }
}
