//! Change sets, actions and cycle results.

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::feed::{Attributes, CanonicalItem};
use crate::retry::{Pacing, RetryPolicy};

use super::guard::SafetyThresholds;
use super::policy::Retention;

/// Default cap on deactivations a single cycle may perform.
pub const DEFAULT_MAX_DESTRUCTIVE_PER_CYCLE: usize = 25;

/// Default number of scheduled cycles admitted per clock hour.
pub const DEFAULT_MAX_CYCLES_PER_HOUR: u32 = 4;

/// Failure digests in cycle details list at most this many SKUs.
const DETAIL_MAX_FAILURES: usize = 10;

/// Kind of remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Insert,
    Update,
    Deactivate,
    Reactivate,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Insert => "insert",
            ActionKind::Update => "update",
            ActionKind::Deactivate => "deactivate",
            ActionKind::Reactivate => "reactivate",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute change on a listing the channel already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePair {
    pub remote_id: String,
    /// Attributes cached in the mirror.
    pub old: Attributes,
    /// The feed item carrying the new attributes.
    pub new: CanonicalItem,
}

impl UpdatePair {
    pub fn sku(&self) -> &str {
        &self.new.sku
    }
}

/// Why a listing is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivateReason {
    /// The SKU fell off the feed.
    Removed,
    /// The feed marks the item sold, on memo, or otherwise unavailable.
    Terminal,
    /// Live on the channel without a mirror record.
    Orphan,
}

impl DeactivateReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeactivateReason::Removed => "removed from feed",
            DeactivateReason::Terminal => "terminal feed status",
            DeactivateReason::Orphan => "orphan listing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deactivation {
    pub sku: String,
    /// `None` when the listing never reached the channel; only the mirror
    /// record is retired.
    pub remote_id: Option<String>,
    pub reason: DeactivateReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reactivation {
    pub remote_id: String,
    pub item: CanonicalItem,
}

/// The differencer's output: what must change on one channel this cycle.
///
/// Every set is sorted by SKU and a SKU appears in at most one set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub to_insert: Vec<CanonicalItem>,
    pub to_update: Vec<UpdatePair>,
    pub to_deactivate: Vec<Deactivation>,
    pub to_reactivate: Vec<Reactivation>,
    /// Archived records gone from both feed and channel; mirror-only cleanup.
    pub to_purge: Vec<String>,
}

impl ChangeSet {
    /// Whether nothing would be written, remotely or locally.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action_count() == 0 && self.to_purge.is_empty()
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.to_insert.len()
            + self.to_update.len()
            + self.to_deactivate.len()
            + self.to_reactivate.len()
    }

    /// Deactivations are the only destructive actions.
    #[must_use]
    pub fn destructive_count(&self) -> usize {
        self.to_deactivate.len()
    }

    pub fn deactivate_skus(&self) -> Vec<&str> {
        self.to_deactivate.iter().map(|d| d.sku.as_str()).collect()
    }

    /// Actions in execution order: deactivations, reactivations, updates,
    /// then inserts. Writes of one kind are contiguous so pacing applies
    /// between them.
    #[must_use]
    pub fn actions(&self) -> Vec<SyncAction> {
        let mut actions = Vec::with_capacity(self.action_count());
        actions.extend(self.to_deactivate.iter().cloned().map(SyncAction::Deactivate));
        actions.extend(self.to_reactivate.iter().cloned().map(SyncAction::Reactivate));
        actions.extend(self.to_update.iter().cloned().map(SyncAction::Update));
        actions.extend(self.to_insert.iter().cloned().map(SyncAction::Insert));
        actions
    }
}

/// One remote write (or local retirement) for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncAction {
    Insert(CanonicalItem),
    Update(UpdatePair),
    Deactivate(Deactivation),
    Reactivate(Reactivation),
}

impl SyncAction {
    pub fn sku(&self) -> &str {
        match self {
            SyncAction::Insert(item) => &item.sku,
            SyncAction::Update(pair) => pair.sku(),
            SyncAction::Deactivate(d) => &d.sku,
            SyncAction::Reactivate(r) => &r.item.sku,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            SyncAction::Insert(_) => ActionKind::Insert,
            SyncAction::Update(_) => ActionKind::Update,
            SyncAction::Deactivate(_) => ActionKind::Deactivate,
            SyncAction::Reactivate(_) => ActionKind::Reactivate,
        }
    }
}

/// Result of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAction {
    pub sku: String,
    pub kind: ActionKind,
    pub error: String,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Actions ran (possibly none, possibly with per-SKU failures).
    Completed,
    /// A cycle-level check failed; nothing was written.
    Aborted { reason: String },
    /// The feed could not be trusted; differencing was skipped.
    FeedDown { reason: String },
    /// The execution window refused the cycle.
    Skipped { reason: String },
}

impl CycleOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::Aborted { .. } => "aborted",
            CycleOutcome::FeedDown { .. } => "feed_down",
            CycleOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CycleOutcome::Completed => None,
            CycleOutcome::Aborted { reason }
            | CycleOutcome::FeedDown { reason }
            | CycleOutcome::Skipped { reason } => Some(reason),
        }
    }
}

/// Report of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub channel: String,
    /// Set for single-SKU repair runs.
    pub single_sku: Option<String>,
    pub dry_run: bool,
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub deactivated: Vec<String>,
    pub reactivated: Vec<String>,
    pub purged: Vec<String>,
    pub failed: Vec<FailedAction>,
    pub outcome: CycleOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleSummary {
    pub fn start(channel: impl Into<String>, single_sku: Option<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            channel: channel.into(),
            single_sku,
            dry_run,
            inserted: Vec::new(),
            updated: Vec::new(),
            deactivated: Vec::new(),
            reactivated: Vec::new(),
            purged: Vec::new(),
            failed: Vec::new(),
            outcome: CycleOutcome::Completed,
            started_at: now,
            finished_at: now,
        }
    }

    /// File an action result under its kind.
    pub fn record(&mut self, sku: &str, kind: ActionKind, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Applied => {
                let bucket = match kind {
                    ActionKind::Insert => &mut self.inserted,
                    ActionKind::Update => &mut self.updated,
                    ActionKind::Deactivate => &mut self.deactivated,
                    ActionKind::Reactivate => &mut self.reactivated,
                };
                bucket.push(sku.to_string());
            }
            ActionOutcome::Failed { error } => self.failed.push(FailedAction {
                sku: sku.to_string(),
                kind,
                error,
            }),
        }
    }

    /// Number of actions that took effect.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.inserted.len()
            + self.updated.len()
            + self.deactivated.len()
            + self.reactivated.len()
    }

    /// Whether the cycle wrote nothing and failed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied_count() == 0 && self.failed.is_empty() && self.purged.is_empty()
    }

    /// Abort reason, or a digest of failed actions.
    pub fn detail(&self) -> Option<String> {
        if let Some(reason) = self.outcome.reason() {
            return Some(reason.to_string());
        }
        if self.failed.is_empty() {
            return None;
        }

        let mut parts: Vec<String> = self
            .failed
            .iter()
            .take(DETAIL_MAX_FAILURES)
            .map(|f| format!("{} ({}): {}", f.sku, f.kind, f.error))
            .collect();
        if self.failed.len() > DETAIL_MAX_FAILURES {
            parts.push(format!("and {} more", self.failed.len() - DETAIL_MAX_FAILURES));
        }
        Some(format!("{} failed: {}", self.failed.len(), parts.join("; ")))
    }
}

/// Tunables for one channel's reconciliation.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Report actions as applied without writing to the channel or mirror.
    pub dry_run: bool,
    /// Backoff for transient channel failures, per action.
    pub retry: RetryPolicy,
    /// Gap between consecutive writes of the same kind.
    pub pacing: Pacing,
    /// Whether deactivated records are deleted or kept for reactivation.
    pub retention: Retention,
    /// Limits the safety guard enforces on full cycles.
    pub thresholds: SafetyThresholds,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            retry: RetryPolicy::default(),
            pacing: Pacing::default(),
            retention: Retention::default(),
            thresholds: SafetyThresholds::default(),
        }
    }
}

/// Hourly admission counter for scheduled cycles.
///
/// Owned by the caller (scheduler loop) and passed in explicitly, so two
/// reconcilers never share hidden counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionWindow {
    /// Cycles admitted per clock hour; zero disables the cap.
    pub max_per_hour: u32,
    hour: Option<DateTime<Utc>>,
    count: u32,
}

impl ExecutionWindow {
    pub fn new(max_per_hour: u32) -> Self {
        Self {
            max_per_hour,
            hour: None,
            count: 0,
        }
    }

    /// Cycles admitted in the current hour.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Admit one cycle at `now` if the hour's cap allows it.
    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        let hour = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        if self.hour != Some(hour) {
            self.hour = Some(hour);
            self.count = 0;
        }
        if self.max_per_hour > 0 && self.count >= self.max_per_hour {
            return false;
        }
        self.count += 1;
        true
    }
}

impl Default for ExecutionWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CYCLES_PER_HOUR)
    }
}
