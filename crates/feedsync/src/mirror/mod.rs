//! Local mirror of what each channel holds.
//!
//! The mirror is owned exclusively by the engine. Records are keyed by
//! `(channel, sku)`, so distinct channels reconcile on disjoint partitions.

mod errors;
mod memory;
mod sql;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::sync_status::SyncStatus;
use crate::feed::Attributes;
use crate::sync::CycleSummary;

pub use errors::{MirrorError, Result};
pub use memory::MemoryMirrorStore;
pub use sql::DbMirrorStore;

/// Mirror contents of one channel, keyed and ordered by SKU.
pub type MirrorSnapshot = BTreeMap<String, MirrorRecord>;

/// The engine's record of one listing on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub channel: String,
    pub sku: String,
    /// Attributes as last accepted by the channel.
    pub attributes: Attributes,
    /// Feed status that accompanied `attributes`.
    pub feed_status: String,
    pub sync_status: SyncStatus,
    /// Set only after a successful create.
    pub remote_id: Option<String>,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MirrorRecord {
    /// A fresh record with no remote counterpart yet.
    pub fn new(channel: impl Into<String>, sku: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            channel: channel.into(),
            sku: sku.into(),
            attributes: Attributes::new(),
            feed_status: String::new(),
            sync_status: SyncStatus::New,
            remote_id: None,
            last_error: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the listing is (or may be) live on the channel.
    ///
    /// A failed push only counts when the listing was created earlier.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self.sync_status {
            SyncStatus::Published | SyncStatus::ChangedWaitingUpdate => true,
            SyncStatus::PublishFailed => self.remote_id.is_some(),
            SyncStatus::New | SyncStatus::WaitingPublish | SyncStatus::Deactivated => false,
        }
    }
}

/// Persisted journal entry of one finished cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub channel: String,
    /// `completed`, `aborted`, `feed_down` or `skipped`.
    pub outcome: String,
    pub single_sku: Option<String>,
    pub dry_run: bool,
    pub inserted: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub reactivated: usize,
    pub purged: usize,
    pub failed: usize,
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl From<&CycleSummary> for CycleRecord {
    fn from(summary: &CycleSummary) -> Self {
        Self {
            channel: summary.channel.clone(),
            outcome: summary.outcome.as_str().to_string(),
            single_sku: summary.single_sku.clone(),
            dry_run: summary.dry_run,
            inserted: summary.inserted.len(),
            updated: summary.updated.len(),
            deactivated: summary.deactivated.len(),
            reactivated: summary.reactivated.len(),
            purged: summary.purged.len(),
            failed: summary.failed.len(),
            detail: summary.detail(),
            started_at: summary.started_at,
            finished_at: summary.finished_at,
        }
    }
}

/// Durable storage for mirror records and the cycle journal.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// All records of one channel.
    async fn load(&self, channel: &str) -> Result<MirrorSnapshot>;

    /// Insert or replace the record keyed by `(record.channel, record.sku)`.
    async fn upsert(&self, record: &MirrorRecord) -> Result<()>;

    /// Delete one record. Returns whether a row existed.
    async fn delete(&self, channel: &str, sku: &str) -> Result<bool>;

    /// Append a finished cycle to the journal.
    async fn record_cycle(&self, summary: &CycleSummary) -> Result<()>;

    /// Most recent cycles of one channel, newest first.
    async fn recent_cycles(&self, channel: &str, limit: u64) -> Result<Vec<CycleRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_not_active() {
        let record = MirrorRecord::new("b2b", "A");
        assert_eq!(record.sync_status, SyncStatus::New);
        assert!(!record.is_active());
    }

    #[test]
    fn publish_failed_is_active_only_with_remote_id() {
        let mut record = MirrorRecord::new("b2b", "A");
        record.sync_status = SyncStatus::PublishFailed;
        assert!(!record.is_active());

        record.remote_id = Some("77".into());
        assert!(record.is_active());
    }

    #[test]
    fn deactivated_is_not_active() {
        let mut record = MirrorRecord::new("b2b", "A");
        record.sync_status = SyncStatus::Deactivated;
        record.remote_id = Some("77".into());
        assert!(!record.is_active());
    }
}
