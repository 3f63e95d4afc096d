//! CycleRun entity - journal of reconciliation cycles per channel.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One finished reconciliation cycle.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cycle_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub channel: String,
    /// `completed`, `aborted`, `feed_down` or `skipped`.
    pub outcome: String,
    /// Whether this was a single-SKU repair run.
    pub single_sku: Option<String>,
    pub dry_run: bool,
    pub inserted: i32,
    pub updated: i32,
    pub deactivated: i32,
    pub reactivated: i32,
    pub purged: i32,
    pub failed: i32,
    /// Abort reason or failure digest.
    #[sea_orm(column_type = "Text", nullable)]
    pub detail: Option<String>,
    pub started_at: DateTimeWithTimeZone,
    pub finished_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
