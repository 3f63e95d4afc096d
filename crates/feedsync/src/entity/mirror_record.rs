//! MirrorRecord entity - the engine's durable record of what each channel holds.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::sync_status::SyncStatus;

/// One synced listing, keyed by `(channel, sku)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mirror_records")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    /// Channel partition this record belongs to.
    pub channel: String,
    /// Canonical SKU from the feed.
    pub sku: String,

    // ─── Synced State ────────────────────────────────────────────────────────
    /// Attributes as last accepted by the channel (JSON object of strings).
    #[sea_orm(column_type = "Json")]
    pub attributes: serde_json::Value,
    /// Feed status that accompanied the cached attributes.
    pub feed_status: String,
    /// Lifecycle status.
    pub sync_status: SyncStatus,
    /// The channel's own identifier, set after a successful create.
    pub remote_id: Option<String>,

    // ─── Diagnostics ─────────────────────────────────────────────────────────
    /// Last error reported by the channel for this listing.
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    /// When the channel last accepted a write for this listing.
    pub last_synced_at: Option<DateTimeWithTimeZone>,
    /// When this record was first written.
    pub created_at: DateTimeWithTimeZone,
    /// When this record was last written.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
