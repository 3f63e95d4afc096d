//! Reconciliation orchestrator.
//!
//! One [`Reconciler`] drives one channel: fetch feed → load mirror → list
//! remote → diff → guard → execute → purge → journal. Cycles on the same
//! reconciler are serialized; separate reconcilers (channels) may run
//! concurrently since they touch disjoint mirror partitions.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedsync::sync::{Reconciler, SyncOptions};
//!
//! let reconciler = Reconciler::builder()
//!     .channel(channel)
//!     .feed(Arc::new(feed))
//!     .store(Arc::new(store))
//!     .options(SyncOptions::default())
//!     .build()?;
//!
//! let summary = reconciler.run_cycle().await?;
//! println!("{} applied, {} failed", summary.applied_count(), summary.failed.len());
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::alert::{Alert, Alerter, Severity, TracingAlerter, notify};
use crate::channel::{ChannelAdapter, RemoteListingRef};
use crate::feed::{CanonicalItem, FeedSource};
use crate::mirror::{MirrorError, MirrorSnapshot, MirrorStore};
use crate::retry::{Sleeper, TokioSleeper};

use super::diff::{diff, duplicate_skus};
use super::executor::ActionExecutor;
use super::guard::{GuardVerdict, SafetyGuard};
use super::policy::{DefaultStatusPolicy, StatusPolicy};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{ChangeSet, CycleOutcome, CycleSummary, ExecutionWindow, SyncOptions};

/// Infrastructure failures. Cycle-level conditions (feed down, guard
/// abort, duplicates) are reported through [`CycleOutcome`] instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Missing required field in builder.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Guarded change set computed by [`Reconciler::plan`].
#[derive(Debug, Clone)]
pub enum Plan {
    Ready {
        change_set: ChangeSet,
        verdict: GuardVerdict,
    },
    /// The cycle would stop before differencing.
    Halted(CycleOutcome),
}

/// Inputs gathered and diffed, ready for the guard.
enum Prepared {
    Ready {
        change_set: ChangeSet,
        mirror: MirrorSnapshot,
        previous_active: usize,
        remote_active: Option<usize>,
    },
    Halted(CycleOutcome),
}

/// Builder for [`Reconciler`].
pub struct ReconcilerBuilder<C> {
    channel: Option<C>,
    feed: Option<Arc<dyn FeedSource>>,
    store: Option<Arc<dyn MirrorStore>>,
    alerter: Option<Arc<dyn Alerter>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    policy: Option<Arc<dyn StatusPolicy>>,
    options: Option<SyncOptions>,
    progress: Option<Arc<ProgressCallback>>,
}

impl<C> Default for ReconcilerBuilder<C> {
    fn default() -> Self {
        Self {
            channel: None,
            feed: None,
            store: None,
            alerter: None,
            sleeper: None,
            policy: None,
            options: None,
            progress: None,
        }
    }
}

impl<C: ChannelAdapter> ReconcilerBuilder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel: C) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn feed(mut self, feed: Arc<dyn FeedSource>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn store(mut self, store: Arc<dyn MirrorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`TracingAlerter`].
    pub fn alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// Defaults to [`TokioSleeper`].
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Defaults to [`DefaultStatusPolicy::default`].
    pub fn policy(mut self, policy: Arc<dyn StatusPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// # Errors
    ///
    /// Returns `ReconcileError::MissingField` if channel, feed or store is unset.
    pub fn build(self) -> Result<Reconciler<C>> {
        let channel = self
            .channel
            .ok_or(ReconcileError::MissingField { field: "channel" })?;
        let feed = self
            .feed
            .ok_or(ReconcileError::MissingField { field: "feed" })?;
        let store = self
            .store
            .ok_or(ReconcileError::MissingField { field: "store" })?;

        Ok(Reconciler {
            channel,
            feed,
            store,
            alerter: self.alerter.unwrap_or_else(|| Arc::new(TracingAlerter)),
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            policy: self
                .policy
                .unwrap_or_else(|| Arc::new(DefaultStatusPolicy::default())),
            options: self.options.unwrap_or_default(),
            progress: self.progress,
            cycle_lock: Mutex::new(()),
        })
    }
}

/// Reconciles one channel against the feed.
pub struct Reconciler<C> {
    channel: C,
    feed: Arc<dyn FeedSource>,
    store: Arc<dyn MirrorStore>,
    alerter: Arc<dyn Alerter>,
    sleeper: Arc<dyn Sleeper>,
    policy: Arc<dyn StatusPolicy>,
    options: SyncOptions,
    progress: Option<Arc<ProgressCallback>>,
    cycle_lock: Mutex<()>,
}

impl<C: ChannelAdapter> Reconciler<C> {
    pub fn builder() -> ReconcilerBuilder<C> {
        ReconcilerBuilder::new()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn MirrorStore> {
        &self.store
    }

    fn on_progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_deref()
    }

    fn guard(&self) -> SafetyGuard {
        SafetyGuard::new(self.options.thresholds.clone())
    }

    /// Run one full reconciliation cycle.
    ///
    /// # Errors
    ///
    /// Only mirror (database) failures are errors; feed outages, guard
    /// aborts and per-SKU failures are reported in the summary.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let _cycle = self.cycle_lock.lock().await;
        let mut summary = CycleSummary::start(self.channel.name(), None, self.options.dry_run);

        match self.prepare(None).await? {
            Prepared::Halted(outcome) => summary.outcome = outcome,
            Prepared::Ready {
                change_set,
                mirror,
                previous_active,
                remote_active,
            } => match self
                .guard()
                .check(&change_set, previous_active, remote_active)
            {
                GuardVerdict::Allow => self.apply(&change_set, &mirror, &mut summary).await,
                GuardVerdict::Abort { reason } => {
                    tracing::warn!(channel = self.channel.name(), %reason, "Safety guard aborted cycle");
                    emit(
                        self.on_progress(),
                        SyncProgress::GuardAborted {
                            channel: self.channel.name().to_string(),
                            reason: reason.clone(),
                        },
                    );
                    summary.outcome = CycleOutcome::Aborted { reason };
                }
            },
        }

        self.finish(summary).await
    }

    /// Repair one SKU: same pipeline restricted to `sku`, without the guard.
    ///
    /// # Errors
    ///
    /// See [`run_cycle`](Self::run_cycle).
    pub async fn run_single_sku(&self, sku: &str) -> Result<CycleSummary> {
        let _cycle = self.cycle_lock.lock().await;
        let mut summary = CycleSummary::start(
            self.channel.name(),
            Some(sku.to_string()),
            self.options.dry_run,
        );

        match self.prepare(Some(sku)).await? {
            Prepared::Halted(outcome) => summary.outcome = outcome,
            Prepared::Ready {
                change_set, mirror, ..
            } => self.apply(&change_set, &mirror, &mut summary).await,
        }

        self.finish(summary).await
    }

    /// Compute and guard the change set without executing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror cannot be loaded.
    pub async fn plan(&self) -> Result<Plan> {
        let _cycle = self.cycle_lock.lock().await;
        Ok(match self.prepare(None).await? {
            Prepared::Halted(outcome) => Plan::Halted(outcome),
            Prepared::Ready {
                change_set,
                previous_active,
                remote_active,
                ..
            } => {
                let verdict = self
                    .guard()
                    .check(&change_set, previous_active, remote_active);
                Plan::Ready {
                    change_set,
                    verdict,
                }
            }
        })
    }

    /// Run a cycle if `window` admits one now.
    ///
    /// # Errors
    ///
    /// See [`run_cycle`](Self::run_cycle).
    pub async fn run_scheduled_cycle(&self, window: &mut ExecutionWindow) -> Result<CycleSummary> {
        self.run_scheduled_cycle_at(window, Utc::now()).await
    }

    /// [`run_scheduled_cycle`](Self::run_scheduled_cycle) at an explicit time.
    ///
    /// # Errors
    ///
    /// See [`run_cycle`](Self::run_cycle).
    pub async fn run_scheduled_cycle_at(
        &self,
        window: &mut ExecutionWindow,
        now: DateTime<Utc>,
    ) -> Result<CycleSummary> {
        if window.admit(now) {
            return self.run_cycle().await;
        }

        let reason = format!(
            "Hourly limit of {} cycles reached",
            window.max_per_hour
        );
        tracing::info!(channel = self.channel.name(), %reason, "Skipping scheduled cycle");
        emit(
            self.on_progress(),
            SyncProgress::CycleSkipped {
                channel: self.channel.name().to_string(),
                reason: reason.clone(),
            },
        );

        let mut summary = CycleSummary::start(self.channel.name(), None, self.options.dry_run);
        summary.outcome = CycleOutcome::Skipped { reason };
        summary.finished_at = Utc::now();
        Ok(summary)
    }

    async fn prepare(&self, single_sku: Option<&str>) -> Result<Prepared> {
        let channel = self.channel.name();

        emit(
            self.on_progress(),
            SyncProgress::FetchingFeed {
                channel: channel.to_string(),
            },
        );
        let feed = match self.feed.fetch().await {
            Ok(items) => items,
            Err(e) => return Ok(self.feed_down(format!("Feed unavailable: {e}"))),
        };
        emit(
            self.on_progress(),
            SyncProgress::FeedFetched {
                channel: channel.to_string(),
                items: feed.len(),
            },
        );

        let mirror = self.store.load(channel).await?;
        let previous_active = mirror.values().filter(|r| r.is_active()).count();
        emit(
            self.on_progress(),
            SyncProgress::MirrorLoaded {
                channel: channel.to_string(),
                records: mirror.len(),
                active: previous_active,
            },
        );

        if feed.is_empty() && previous_active > 0 {
            return Ok(self.feed_down(format!(
                "Feed returned no items while {previous_active} listings are active"
            )));
        }

        let duplicates = duplicate_skus(&feed);
        if !duplicates.is_empty() {
            let reason = format!("Duplicate SKUs in feed: {}", duplicates.join(", "));
            tracing::error!(channel, %reason, "Rejecting feed snapshot");
            return Ok(Prepared::Halted(CycleOutcome::Aborted { reason }));
        }

        let remote = match self.channel.list_active().await {
            Ok(remote) => remote,
            Err(e) => {
                let reason = format!("Channel listing unavailable: {e}");
                tracing::warn!(channel, %reason, "Cannot enumerate remote listings");
                return Ok(Prepared::Halted(CycleOutcome::Aborted { reason }));
            }
        };
        let remote_active = remote
            .as_ref()
            .map(|refs| refs.iter().filter(|r| r.remote_status.is_live()).count());
        if let Some(live) = remote_active {
            emit(
                self.on_progress(),
                SyncProgress::RemoteListed {
                    channel: channel.to_string(),
                    live,
                },
            );
        }

        let (feed, mirror, remote) = match single_sku {
            Some(sku) => restrict_to_sku(sku, feed, mirror, remote),
            None => (feed, mirror, remote),
        };

        let change_set = match diff(&feed, &mirror, remote.as_deref(), self.policy.as_ref()) {
            Ok(change_set) => change_set,
            Err(e) => return Ok(Prepared::Halted(CycleOutcome::Aborted { reason: e.to_string() })),
        };

        tracing::info!(
            channel,
            inserts = change_set.to_insert.len(),
            updates = change_set.to_update.len(),
            deactivations = change_set.to_deactivate.len(),
            reactivations = change_set.to_reactivate.len(),
            purges = change_set.to_purge.len(),
            "Change set computed"
        );
        emit(
            self.on_progress(),
            SyncProgress::Planned {
                channel: channel.to_string(),
                inserts: change_set.to_insert.len(),
                updates: change_set.to_update.len(),
                deactivations: change_set.to_deactivate.len(),
                reactivations: change_set.to_reactivate.len(),
                purges: change_set.to_purge.len(),
            },
        );

        Ok(Prepared::Ready {
            change_set,
            mirror,
            previous_active,
            remote_active,
        })
    }

    fn feed_down(&self, reason: String) -> Prepared {
        tracing::warn!(channel = self.channel.name(), %reason, "Feed down, skipping cycle");
        emit(
            self.on_progress(),
            SyncProgress::FeedDown {
                channel: self.channel.name().to_string(),
                reason: reason.clone(),
            },
        );
        Prepared::Halted(CycleOutcome::FeedDown { reason })
    }

    async fn apply(&self, change_set: &ChangeSet, mirror: &MirrorSnapshot, summary: &mut CycleSummary) {
        let mut executor = ActionExecutor::new(
            &self.channel,
            self.store.as_ref(),
            self.alerter.as_ref(),
            self.sleeper.as_ref(),
            &self.options,
        )
        .with_progress(self.on_progress());

        for action in change_set.actions() {
            let outcome = executor.execute(&action, mirror.get(action.sku())).await;
            summary.record(action.sku(), action.kind(), outcome);
        }

        for sku in &change_set.to_purge {
            if self.options.dry_run {
                summary.purged.push(sku.clone());
                continue;
            }
            match self.store.delete(self.channel.name(), sku).await {
                Ok(_) => {
                    summary.purged.push(sku.clone());
                    emit(self.on_progress(), SyncProgress::Purged { sku: sku.clone() });
                }
                Err(e) => {
                    tracing::warn!(
                        channel = self.channel.name(),
                        sku = %sku,
                        error = %e,
                        "Failed to purge archived record"
                    );
                    emit(
                        self.on_progress(),
                        SyncProgress::Warning {
                            message: format!("Failed to purge {sku}: {e}"),
                        },
                    );
                }
            }
        }
    }

    async fn finish(&self, mut summary: CycleSummary) -> Result<CycleSummary> {
        summary.finished_at = Utc::now();

        tracing::info!(
            channel = %summary.channel,
            outcome = summary.outcome.as_str(),
            inserted = summary.inserted.len(),
            updated = summary.updated.len(),
            deactivated = summary.deactivated.len(),
            reactivated = summary.reactivated.len(),
            purged = summary.purged.len(),
            failed = summary.failed.len(),
            dry_run = summary.dry_run,
            "Cycle finished"
        );

        if !summary.dry_run {
            self.store.record_cycle(&summary).await?;
            if let Some(alert) = cycle_alert(&summary) {
                notify(self.alerter.as_ref(), alert).await;
            }
        }

        emit(
            self.on_progress(),
            SyncProgress::CycleComplete {
                summary: Box::new(summary.clone()),
            },
        );
        Ok(summary)
    }
}

/// Narrow cycle inputs to one SKU.
///
/// Remote listings are kept when they carry the SKU or the remote id the
/// mirror knows for it.
fn restrict_to_sku(
    sku: &str,
    feed: Vec<CanonicalItem>,
    mut mirror: MirrorSnapshot,
    remote: Option<Vec<RemoteListingRef>>,
) -> (
    Vec<CanonicalItem>,
    MirrorSnapshot,
    Option<Vec<RemoteListingRef>>,
) {
    let feed: Vec<CanonicalItem> = feed.into_iter().filter(|item| item.sku == sku).collect();
    let record = mirror.remove(sku);
    let known_id = record.as_ref().and_then(|r| r.remote_id.clone());
    let remote = remote.map(|refs| {
        refs.into_iter()
            .filter(|r| {
                r.sku.as_deref() == Some(sku) || known_id.as_deref() == Some(r.remote_id.as_str())
            })
            .collect()
    });
    let mirror = record.map(|r| (sku.to_string(), r)).into_iter().collect();
    (feed, mirror, remote)
}

/// Summary alert for a finished cycle; `None` when nothing happened.
fn cycle_alert(summary: &CycleSummary) -> Option<Alert> {
    let (severity, message) = match &summary.outcome {
        CycleOutcome::Skipped { .. } => return None,
        CycleOutcome::FeedDown { reason } => (Severity::Warning, format!("Feed down: {reason}")),
        CycleOutcome::Aborted { reason } => (Severity::Error, format!("Cycle aborted: {reason}")),
        CycleOutcome::Completed if summary.is_noop() => return None,
        CycleOutcome::Completed => {
            let severity = if summary.failed.is_empty() {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut message = format!(
                "Cycle completed: {} inserted, {} updated, {} deactivated, {} reactivated, {} purged, {} failed",
                summary.inserted.len(),
                summary.updated.len(),
                summary.deactivated.len(),
                summary.reactivated.len(),
                summary.purged.len(),
                summary.failed.len()
            );
            if let Some(detail) = summary.detail() {
                message.push_str(&format!(" ({detail})"));
            }
            (severity, message)
        }
    };

    let alert = Alert::new(severity, summary.channel.as_str(), "cycle", message);
    Some(match &summary.single_sku {
        Some(sku) => alert.for_sku(sku.as_str()),
        None => alert,
    })
}
