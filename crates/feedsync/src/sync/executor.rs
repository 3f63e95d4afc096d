//! Applies one [`SyncAction`] to the channel and records the result.
//!
//! Actions run one at a time. Each remote write goes through
//! [`with_retry`]; the mirror is written only after the channel answers, so
//! a failed write never advances cached attributes.

use std::future::Future;

use chrono::Utc;

use crate::alert::{Alert, Alerter, Severity, notify};
use crate::channel::{ChannelAdapter, ChannelError, ErrorClass, short_error_message};
use crate::entity::sync_status::SyncStatus;
use crate::feed::CanonicalItem;
use crate::mirror::{MirrorError, MirrorRecord, MirrorStore};
use crate::retry::{Sleeper, with_retry};

use super::policy::Retention;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::state::SyncEvent;
use super::types::{
    ActionKind, ActionOutcome, Deactivation, Reactivation, SyncAction, SyncOptions, UpdatePair,
};

/// Why an action failed and how loudly to say so.
struct ActionFailure {
    message: String,
    severity: Severity,
}

impl ActionFailure {
    fn channel(err: &ChannelError) -> Self {
        Self {
            message: short_error_message(err),
            severity: Severity::Error,
        }
    }

    /// The channel accepted the write but the mirror did not record it.
    fn mirror(err: MirrorError) -> Self {
        Self {
            message: format!("Channel write applied but mirror update failed: {err}"),
            severity: Severity::Critical,
        }
    }
}

/// In-flight status an action moves its record through.
fn in_flight_status(action: &SyncAction, current: Option<&MirrorRecord>) -> SyncStatus {
    let status = current.map(|r| r.sync_status);
    let (from, event, fallback) = match action {
        SyncAction::Insert(_) => (
            status
                .filter(|s| *s == SyncStatus::PublishFailed)
                .unwrap_or(SyncStatus::New),
            SyncEvent::QueueInsert,
            SyncStatus::WaitingPublish,
        ),
        SyncAction::Update(_) => (
            status.unwrap_or(SyncStatus::Published),
            SyncEvent::QueueUpdate,
            SyncStatus::ChangedWaitingUpdate,
        ),
        SyncAction::Reactivate(_) => (
            status.unwrap_or(SyncStatus::Deactivated),
            SyncEvent::Reactivate,
            SyncStatus::WaitingPublish,
        ),
        SyncAction::Deactivate(_) => return SyncStatus::Deactivated,
    };

    from.apply(event).unwrap_or_else(|e| {
        tracing::warn!(sku = action.sku(), error = %e, "Unexpected mirror state");
        fallback
    })
}

/// Settled status after the channel answered a queued write.
fn settle(in_flight: SyncStatus, succeeded: bool) -> SyncStatus {
    let (event, fallback) = if succeeded {
        (SyncEvent::Succeeded, SyncStatus::Published)
    } else {
        (SyncEvent::Failed, SyncStatus::PublishFailed)
    };
    in_flight.apply(event).unwrap_or(fallback)
}

/// Executes actions for one channel within one cycle.
pub struct ActionExecutor<'a> {
    channel: &'a dyn ChannelAdapter,
    store: &'a dyn MirrorStore,
    alerter: &'a dyn Alerter,
    sleeper: &'a dyn Sleeper,
    options: &'a SyncOptions,
    on_progress: Option<&'a ProgressCallback>,
    /// Kind of the previous remote write, for pacing.
    last_kind: Option<ActionKind>,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        channel: &'a dyn ChannelAdapter,
        store: &'a dyn MirrorStore,
        alerter: &'a dyn Alerter,
        sleeper: &'a dyn Sleeper,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            channel,
            store,
            alerter,
            sleeper,
            options,
            on_progress: None,
            last_kind: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Apply `action`; `current` is the SKU's mirror record, if any.
    ///
    /// Never returns an error: every failure becomes
    /// [`ActionOutcome::Failed`] for this SKU only.
    pub async fn execute(
        &mut self,
        action: &SyncAction,
        current: Option<&MirrorRecord>,
    ) -> ActionOutcome {
        let sku = action.sku();
        let kind = action.kind();
        let dry_run = self.options.dry_run;
        let in_flight = in_flight_status(action, current);

        emit(
            self.on_progress,
            SyncProgress::ActionStarted {
                sku: sku.to_string(),
                kind,
                status: in_flight,
                dry_run,
            },
        );

        if dry_run {
            tracing::info!(channel = self.channel.name(), sku, action = %kind, "Dry run: would apply");
            emit(
                self.on_progress,
                SyncProgress::ActionApplied {
                    sku: sku.to_string(),
                    kind,
                    dry_run,
                },
            );
            return ActionOutcome::Applied;
        }

        let result = match action {
            SyncAction::Insert(item) => self.insert(item, current, in_flight).await,
            SyncAction::Update(pair) => self.update(pair, current, in_flight).await,
            SyncAction::Deactivate(deactivation) => self.deactivate(deactivation, current).await,
            SyncAction::Reactivate(reactivation) => {
                self.reactivate(reactivation, current, in_flight).await
            }
        };

        match result {
            Ok(message) => {
                tracing::info!(channel = self.channel.name(), sku, action = %kind, "{message}");
                emit(
                    self.on_progress,
                    SyncProgress::ActionApplied {
                        sku: sku.to_string(),
                        kind,
                        dry_run,
                    },
                );
                notify(
                    self.alerter,
                    Alert::new(Severity::Info, self.channel.name(), kind.as_str(), message)
                        .for_sku(sku),
                )
                .await;
                ActionOutcome::Applied
            }
            Err(failure) => {
                tracing::warn!(
                    channel = self.channel.name(),
                    sku,
                    action = %kind,
                    error = %failure.message,
                    "Action failed"
                );
                emit(
                    self.on_progress,
                    SyncProgress::ActionFailed {
                        sku: sku.to_string(),
                        kind,
                        error: failure.message.clone(),
                    },
                );
                notify(
                    self.alerter,
                    Alert::new(
                        failure.severity,
                        self.channel.name(),
                        kind.as_str(),
                        failure.message.clone(),
                    )
                    .for_sku(sku),
                )
                .await;
                ActionOutcome::Failed {
                    error: failure.message,
                }
            }
        }
    }

    async fn insert(
        &mut self,
        item: &CanonicalItem,
        current: Option<&MirrorRecord>,
        in_flight: SyncStatus,
    ) -> Result<String, ActionFailure> {
        // Only a failed first publish is carried over; anything else starts fresh.
        let mut record = match current {
            Some(r) if r.sync_status == SyncStatus::PublishFailed => r.clone(),
            _ => MirrorRecord::new(self.channel.name(), &item.sku),
        };

        self.pace(ActionKind::Insert).await;
        let channel = self.channel;
        let result = self
            .call(&item.sku, ActionKind::Insert, || channel.create(item))
            .await;

        match result {
            Ok(remote_id) => {
                record.remote_id = Some(remote_id.clone());
                record.attributes = item.attributes.clone();
                record.feed_status = item.feed_status.clone();
                record.sync_status = settle(in_flight, true);
                record.last_error = None;
                record.last_synced_at = Some(Utc::now());
                self.save(&record).await?;
                Ok(format!("Listed as {remote_id}"))
            }
            Err(e) => {
                record.feed_status = item.feed_status.clone();
                Err(self
                    .record_failure(Some(record), Some(settle(in_flight, false)), &e)
                    .await)
            }
        }
    }

    async fn update(
        &mut self,
        pair: &UpdatePair,
        current: Option<&MirrorRecord>,
        in_flight: SyncStatus,
    ) -> Result<String, ActionFailure> {
        let mut record = current.cloned().unwrap_or_else(|| {
            let mut r = MirrorRecord::new(self.channel.name(), pair.sku());
            r.remote_id = Some(pair.remote_id.clone());
            r.attributes = pair.old.clone();
            r
        });

        self.pace(ActionKind::Update).await;
        let channel = self.channel;
        let result = self
            .call(pair.sku(), ActionKind::Update, || {
                channel.update(&pair.remote_id, &pair.new)
            })
            .await;

        match result {
            Ok(()) => {
                record.attributes = pair.new.attributes.clone();
                record.feed_status = pair.new.feed_status.clone();
                record.sync_status = settle(in_flight, true);
                record.last_error = None;
                record.last_synced_at = Some(Utc::now());
                self.save(&record).await?;
                Ok(format!("Updated {}", pair.remote_id))
            }
            Err(e) => Err(self
                .record_failure(Some(record), Some(settle(in_flight, false)), &e)
                .await),
        }
    }

    async fn deactivate(
        &mut self,
        deactivation: &Deactivation,
        current: Option<&MirrorRecord>,
    ) -> Result<String, ActionFailure> {
        let sku = deactivation.sku.as_str();

        if let Some(remote_id) = deactivation.remote_id.as_deref() {
            self.pace(ActionKind::Deactivate).await;
            let channel = self.channel;
            let result = self
                .call(sku, ActionKind::Deactivate, || channel.deactivate(remote_id))
                .await;

            match result {
                Ok(()) => {}
                Err(e)
                    if e.class() == ErrorClass::AlreadyConverged
                        || matches!(e, ChannelError::NotFound { .. }) =>
                {
                    tracing::info!(sku, remote_id, "Listing already ended on channel");
                }
                Err(e) => return Err(self.record_failure(current.cloned(), None, &e).await),
            }
        }

        let Some(record) = current else {
            return Ok(format!("Ended {}", deactivation.reason.as_str()));
        };

        if self.options.retention == Retention::Archive && record.remote_id.is_some() {
            let mut archived = record.clone();
            archived.sync_status = record
                .sync_status
                .apply(SyncEvent::Deactivate)
                .unwrap_or(SyncStatus::Deactivated);
            archived.last_error = None;
            archived.last_synced_at = Some(Utc::now());
            self.save(&archived).await?;
        } else {
            self.store
                .delete(&record.channel, &record.sku)
                .await
                .map_err(ActionFailure::mirror)?;
        }

        Ok(format!("Ended ({})", deactivation.reason.as_str()))
    }

    async fn reactivate(
        &mut self,
        reactivation: &Reactivation,
        current: Option<&MirrorRecord>,
        in_flight: SyncStatus,
    ) -> Result<String, ActionFailure> {
        let item = &reactivation.item;
        let mut record = current.cloned().unwrap_or_else(|| {
            let mut r = MirrorRecord::new(self.channel.name(), &item.sku);
            r.sync_status = SyncStatus::Deactivated;
            r.remote_id = Some(reactivation.remote_id.clone());
            r
        });

        self.pace(ActionKind::Reactivate).await;
        let channel = self.channel;
        let result = self
            .call(&item.sku, ActionKind::Reactivate, || {
                channel.reactivate(&reactivation.remote_id, item)
            })
            .await;

        match result {
            Ok(()) => {
                record.remote_id = Some(reactivation.remote_id.clone());
                record.attributes = item.attributes.clone();
                record.feed_status = item.feed_status.clone();
                record.sync_status = settle(in_flight, true);
                record.last_error = None;
                record.last_synced_at = Some(Utc::now());
                self.save(&record).await?;
                Ok(format!("Reactivated {}", reactivation.remote_id))
            }
            // Stays Deactivated; the next cycle decides again.
            Err(e) => Err(self.record_failure(Some(record), None, &e).await),
        }
    }

    /// Sleep a randomized gap when the previous write was of the same kind.
    async fn pace(&mut self, kind: ActionKind) {
        if self.last_kind == Some(kind) {
            let delay = self.options.pacing.next_delay();
            if !delay.is_zero() {
                self.sleeper.sleep(delay).await;
            }
        }
        self.last_kind = Some(kind);
    }

    async fn call<T, F, Fut>(
        &self,
        sku: &str,
        kind: ActionKind,
        operation: F,
    ) -> Result<T, ChannelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let on_progress = self.on_progress;
        let channel = self.channel.name();
        with_retry(&self.options.retry, self.sleeper, operation, |notice| {
            tracing::warn!(
                channel,
                sku,
                action = %kind,
                attempt = notice.attempt,
                delay_ms = notice.delay.as_millis() as u64,
                error = %notice.error,
                "Transient failure, retrying"
            );
            emit(
                on_progress,
                SyncProgress::ActionRetry {
                    sku: sku.to_string(),
                    kind,
                    attempt: notice.attempt,
                    delay: notice.delay,
                    error: notice.error.clone(),
                },
            );
        })
        .await
    }

    async fn save(&self, record: &MirrorRecord) -> Result<(), ActionFailure> {
        self.store.upsert(record).await.map_err(ActionFailure::mirror)
    }

    /// Persist the error on the record (when there is one) and build the failure.
    async fn record_failure(
        &self,
        record: Option<MirrorRecord>,
        status: Option<SyncStatus>,
        err: &ChannelError,
    ) -> ActionFailure {
        let failure = ActionFailure::channel(err);
        let Some(mut record) = record else {
            return failure;
        };

        if let Some(status) = status {
            record.sync_status = status;
        }
        record.last_error = Some(failure.message.clone());
        if let Err(e) = self.store.upsert(&record).await {
            tracing::error!(sku = %record.sku, error = %e, "Failed to record action failure");
        }
        failure
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::alert::AlertError;
    use crate::channel::{self, RemoteListingRef};
    use crate::mirror::MemoryMirrorStore;
    use crate::retry::{Pacing, RetryPolicy};
    use crate::sync::types::DeactivateReason;

    #[derive(Default)]
    struct FakeChannel {
        script: Mutex<VecDeque<channel::Result<String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeChannel {
        fn scripted(script: Vec<channel::Result<String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        fn next(&self, call: String) -> channel::Result<String> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(call);
                calls.len()
            };
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("R-{n}")))
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelAdapter for FakeChannel {
        fn name(&self) -> &str {
            "b2b"
        }

        async fn create(&self, item: &CanonicalItem) -> channel::Result<String> {
            self.next(format!("create {}", item.sku))
        }

        async fn update(&self, remote_id: &str, _item: &CanonicalItem) -> channel::Result<()> {
            self.next(format!("update {remote_id}")).map(|_| ())
        }

        async fn deactivate(&self, remote_id: &str) -> channel::Result<()> {
            self.next(format!("deactivate {remote_id}")).map(|_| ())
        }

        async fn reactivate(&self, remote_id: &str, _item: &CanonicalItem) -> channel::Result<()> {
            self.next(format!("reactivate {remote_id}")).map(|_| ())
        }

        async fn list_active(&self) -> channel::Result<Option<Vec<RemoteListingRef>>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingAlerter {
        alerts: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl Alerter for RecordingAlerter {
        async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    impl RecordingAlerter {
        fn severities(&self) -> Vec<Severity> {
            self.alerts.lock().unwrap().iter().map(|a| a.severity).collect()
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    struct Harness {
        channel: FakeChannel,
        store: MemoryMirrorStore,
        alerter: RecordingAlerter,
        sleeper: RecordingSleeper,
        options: SyncOptions,
    }

    impl Harness {
        fn new(channel: FakeChannel) -> Self {
            Self {
                channel,
                store: MemoryMirrorStore::new(),
                alerter: RecordingAlerter::default(),
                sleeper: RecordingSleeper::default(),
                options: SyncOptions {
                    retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4))
                        .with_jitter(false),
                    pacing: Pacing::none(),
                    ..SyncOptions::default()
                },
            }
        }

        fn executor(&self) -> ActionExecutor<'_> {
            ActionExecutor::new(
                &self.channel,
                &self.store,
                &self.alerter,
                &self.sleeper,
                &self.options,
            )
        }

        async fn record(&self, sku: &str) -> Option<MirrorRecord> {
            self.store.load("b2b").await.unwrap().remove(sku)
        }
    }

    fn item(sku: &str, price: &str) -> CanonicalItem {
        CanonicalItem::new(sku, "Available").with_attr("price", price)
    }

    fn published(sku: &str, remote_id: &str, price: &str) -> MirrorRecord {
        let mut r = MirrorRecord::new("b2b", sku);
        r.sync_status = SyncStatus::Published;
        r.remote_id = Some(remote_id.into());
        r.feed_status = "Available".into();
        r.attributes.insert("price".into(), price.into());
        r
    }

    #[tokio::test]
    async fn insert_publishes_and_caches_attributes() {
        let h = Harness::new(FakeChannel::scripted(vec![Ok("L-77".into())]));

        let outcome = h
            .executor()
            .execute(&SyncAction::Insert(item("A", "100")), None)
            .await;

        assert_eq!(outcome, ActionOutcome::Applied);
        let record = h.record("A").await.expect("record written");
        assert_eq!(record.sync_status, SyncStatus::Published);
        assert_eq!(record.remote_id.as_deref(), Some("L-77"));
        assert_eq!(record.attributes.get("price").map(String::as_str), Some("100"));
        assert!(record.last_synced_at.is_some());
        assert_eq!(h.alerter.severities(), vec![Severity::Info]);
    }

    #[tokio::test]
    async fn transient_failures_retry_in_place_without_alerting() {
        let h = Harness::new(FakeChannel::scripted(vec![
            Err(ChannelError::network("reset")),
            Err(ChannelError::RateLimited { retry_after: None }),
            Ok("L-1".into()),
        ]));

        let retries = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&retries);
        let callback: ProgressCallback = Box::new(move |event| {
            if let SyncProgress::ActionRetry { attempt, .. } = event {
                seen.lock().unwrap().push(attempt);
            }
        });

        let outcome = h
            .executor()
            .with_progress(Some(&callback))
            .execute(&SyncAction::Insert(item("X", "1")), None)
            .await;

        assert_eq!(outcome, ActionOutcome::Applied);
        assert_eq!(h.channel.calls().len(), 3);
        assert_eq!(*retries.lock().unwrap(), vec![1, 2]);
        assert_eq!(h.sleeper.slept.lock().unwrap().len(), 2);
        assert_eq!(h.alerter.severities(), vec![Severity::Info]);
    }

    #[tokio::test]
    async fn failed_insert_is_recorded_for_next_cycle() {
        let h = Harness::new(FakeChannel::scripted(vec![Err(ChannelError::rejected(
            "HTTP 422: missing reference number",
        ))]));

        let outcome = h
            .executor()
            .execute(&SyncAction::Insert(item("A", "1")), None)
            .await;

        let ActionOutcome::Failed { error } = outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("missing reference number"));
        let record = h.record("A").await.expect("failure recorded");
        assert_eq!(record.sync_status, SyncStatus::PublishFailed);
        assert_eq!(record.remote_id, None);
        assert_eq!(record.last_error.as_deref(), Some(error.as_str()));
        assert_eq!(h.channel.calls().len(), 1, "permanent errors are not retried");
        assert_eq!(h.alerter.severities(), vec![Severity::Error]);
    }

    #[tokio::test]
    async fn failed_update_keeps_cached_attributes() {
        let h = Harness::new(FakeChannel::scripted(vec![Err(ChannelError::rejected(
            "price below floor",
        ))]));
        let current = published("A", "1", "100");
        h.store.upsert(&current).await.unwrap();

        let pair = UpdatePair {
            remote_id: "1".into(),
            old: current.attributes.clone(),
            new: item("A", "90"),
        };
        let outcome = h
            .executor()
            .execute(&SyncAction::Update(pair), Some(&current))
            .await;

        assert!(matches!(outcome, ActionOutcome::Failed { .. }));
        let record = h.record("A").await.unwrap();
        assert_eq!(record.sync_status, SyncStatus::PublishFailed);
        assert_eq!(record.attributes.get("price").map(String::as_str), Some("100"));
        assert!(record.last_error.is_some());
    }

    #[tokio::test]
    async fn already_ended_listing_counts_as_deactivated() {
        let h = Harness::new(FakeChannel::scripted(vec![Err(ChannelError::AlreadyEnded {
            remote_id: "2".into(),
        })]));
        let current = published("B", "2", "1");
        h.store.upsert(&current).await.unwrap();

        let action = SyncAction::Deactivate(Deactivation {
            sku: "B".into(),
            remote_id: Some("2".into()),
            reason: DeactivateReason::Removed,
        });
        let outcome = h.executor().execute(&action, Some(&current)).await;

        assert_eq!(outcome, ActionOutcome::Applied);
        assert!(h.record("B").await.is_none());
    }

    #[tokio::test]
    async fn archive_retention_keeps_deactivated_record() {
        let mut h = Harness::new(FakeChannel::default());
        h.options.retention = Retention::Archive;
        let current = published("B", "2", "1");
        h.store.upsert(&current).await.unwrap();

        let action = SyncAction::Deactivate(Deactivation {
            sku: "B".into(),
            remote_id: Some("2".into()),
            reason: DeactivateReason::Terminal,
        });
        assert_eq!(
            h.executor().execute(&action, Some(&current)).await,
            ActionOutcome::Applied
        );

        let record = h.record("B").await.expect("archived");
        assert_eq!(record.sync_status, SyncStatus::Deactivated);
        assert_eq!(record.remote_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn deactivating_unpublished_record_skips_the_channel() {
        let h = Harness::new(FakeChannel::default());
        let mut current = MirrorRecord::new("b2b", "A");
        current.sync_status = SyncStatus::PublishFailed;
        h.store.upsert(&current).await.unwrap();

        let action = SyncAction::Deactivate(Deactivation {
            sku: "A".into(),
            remote_id: None,
            reason: DeactivateReason::Removed,
        });
        assert_eq!(
            h.executor().execute(&action, Some(&current)).await,
            ActionOutcome::Applied
        );
        assert!(h.channel.calls().is_empty());
        assert!(h.record("A").await.is_none());
    }

    #[tokio::test]
    async fn failed_reactivation_stays_deactivated() {
        let h = Harness::new(FakeChannel::scripted(vec![Err(ChannelError::rejected(
            "listing expired",
        ))]));
        let mut current = published("A", "1", "1");
        current.sync_status = SyncStatus::Deactivated;
        h.store.upsert(&current).await.unwrap();

        let action = SyncAction::Reactivate(Reactivation {
            remote_id: "1".into(),
            item: item("A", "2"),
        });
        let outcome = h.executor().execute(&action, Some(&current)).await;

        assert!(matches!(outcome, ActionOutcome::Failed { .. }));
        let record = h.record("A").await.unwrap();
        assert_eq!(record.sync_status, SyncStatus::Deactivated);
        assert_eq!(record.attributes.get("price").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn successful_reactivation_refreshes_attributes() {
        let h = Harness::new(FakeChannel::default());
        let mut current = published("A", "1", "1");
        current.sync_status = SyncStatus::Deactivated;

        let action = SyncAction::Reactivate(Reactivation {
            remote_id: "1".into(),
            item: item("A", "2"),
        });
        assert_eq!(
            h.executor().execute(&action, Some(&current)).await,
            ActionOutcome::Applied
        );
        let record = h.record("A").await.unwrap();
        assert_eq!(record.sync_status, SyncStatus::Published);
        assert_eq!(record.attributes.get("price").map(String::as_str), Some("2"));
        assert_eq!(h.channel.calls(), vec!["reactivate 1"]);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let mut h = Harness::new(FakeChannel::default());
        h.options.dry_run = true;

        let outcome = h
            .executor()
            .execute(&SyncAction::Insert(item("A", "1")), None)
            .await;

        assert_eq!(outcome, ActionOutcome::Applied);
        assert!(h.channel.calls().is_empty());
        assert_eq!(h.store.write_count(), 0);
        assert!(h.alerter.severities().is_empty());
    }

    #[tokio::test]
    async fn pacing_applies_between_writes_of_the_same_kind() {
        let mut h = Harness::new(FakeChannel::default());
        h.options.pacing = Pacing {
            min: Duration::from_millis(700),
            max: Duration::from_millis(700),
        };

        let mut executor = h.executor();
        executor.execute(&SyncAction::Insert(item("A", "1")), None).await;
        executor.execute(&SyncAction::Insert(item("B", "1")), None).await;
        let current = published("C", "3", "1");
        executor
            .execute(
                &SyncAction::Deactivate(Deactivation {
                    sku: "C".into(),
                    remote_id: Some("3".into()),
                    reason: DeactivateReason::Removed,
                }),
                Some(&current),
            )
            .await;
        drop(executor);

        assert_eq!(
            *h.sleeper.slept.lock().unwrap(),
            vec![Duration::from_millis(700)]
        );
    }

    #[test]
    fn in_flight_states_follow_the_lifecycle() {
        let update = SyncAction::Update(UpdatePair {
            remote_id: "1".into(),
            old: Default::default(),
            new: item("A", "1"),
        });
        assert_eq!(
            in_flight_status(&update, Some(&published("A", "1", "1"))),
            SyncStatus::ChangedWaitingUpdate
        );

        let mut failed = published("A", "1", "1");
        failed.sync_status = SyncStatus::PublishFailed;
        assert_eq!(in_flight_status(&update, Some(&failed)), SyncStatus::WaitingPublish);
        assert_eq!(settle(SyncStatus::WaitingPublish, false), SyncStatus::PublishFailed);
    }
}
