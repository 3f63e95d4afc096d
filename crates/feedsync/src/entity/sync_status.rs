//! Sync status enum for mirrored listings.
//!
//! The transition rules live in [`crate::sync::state`]; this module only
//! defines the persisted representation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a listing in the local mirror.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Seen on the feed, nothing sent to the channel yet.
    #[sea_orm(string_value = "new")]
    #[default]
    New,
    /// Create (or reactivate) queued for this cycle.
    #[sea_orm(string_value = "waiting_publish")]
    WaitingPublish,
    /// Live on the channel with the cached attributes.
    #[sea_orm(string_value = "published")]
    Published,
    /// Attribute change queued for this cycle.
    #[sea_orm(string_value = "changed_waiting_update")]
    ChangedWaitingUpdate,
    /// Last create or update was rejected; retried next cycle.
    #[sea_orm(string_value = "publish_failed")]
    PublishFailed,
    /// Ended on the channel. Kept only under the archive retention policy.
    #[sea_orm(string_value = "deactivated")]
    Deactivated,
}

impl SyncStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [SyncStatus; 6] = [
        SyncStatus::New,
        SyncStatus::WaitingPublish,
        SyncStatus::Published,
        SyncStatus::ChangedWaitingUpdate,
        SyncStatus::PublishFailed,
        SyncStatus::Deactivated,
    ];

    /// Stable string form, identical to the database value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::New => "new",
            SyncStatus::WaitingPublish => "waiting_publish",
            SyncStatus::Published => "published",
            SyncStatus::ChangedWaitingUpdate => "changed_waiting_update",
            SyncStatus::PublishFailed => "publish_failed",
            SyncStatus::Deactivated => "deactivated",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        SyncStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Unknown sync status: {}", s))
    }
}
