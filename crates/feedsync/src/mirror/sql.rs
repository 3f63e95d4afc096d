use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::cycle_run::{
    ActiveModel as CycleRunActiveModel, Column as CycleRunColumn, Entity as CycleRun,
    Model as CycleRunModel,
};
use crate::entity::mirror_record::{
    ActiveModel as MirrorRecordActiveModel, Column as MirrorRecordColumn,
    Entity as MirrorRecordEntity, Model as MirrorRecordModel,
};
use crate::feed::Attributes;
use crate::sync::CycleSummary;

use super::errors::{MirrorError, Result};
use super::{CycleRecord, MirrorRecord, MirrorSnapshot, MirrorStore};

/// Mirror store backed by the `mirror_records` and `cycle_runs` tables.
#[derive(Clone)]
pub struct DbMirrorStore {
    db: Arc<DatabaseConnection>,
}

impl DbMirrorStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// ON CONFLICT clause for record upserts.
///
/// `(channel, sku)` is the natural key. `id` and `created_at` keep the
/// values of the first insert.
pub(crate) fn build_upsert_on_conflict() -> OnConflict {
    OnConflict::columns([MirrorRecordColumn::Channel, MirrorRecordColumn::Sku])
        .update_columns([
            MirrorRecordColumn::Attributes,
            MirrorRecordColumn::FeedStatus,
            MirrorRecordColumn::SyncStatus,
            MirrorRecordColumn::RemoteId,
            MirrorRecordColumn::LastError,
            MirrorRecordColumn::LastSyncedAt,
            MirrorRecordColumn::UpdatedAt,
        ])
        .to_owned()
}

fn attributes_to_json(attributes: &Attributes) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn attributes_from_json(channel: &str, sku: &str, value: Value) -> Result<Attributes> {
    match value {
        Value::Null => Ok(Attributes::new()),
        Value::Object(fields) => Ok(fields
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((name, s)),
                other => Some((name, other.to_string())),
            })
            .collect()),
        other => Err(MirrorError::corrupt(
            channel,
            sku,
            format!("attributes column holds {other}, expected an object"),
        )),
    }
}

fn record_from_model(model: MirrorRecordModel) -> Result<MirrorRecord> {
    let attributes = attributes_from_json(&model.channel, &model.sku, model.attributes)?;
    Ok(MirrorRecord {
        channel: model.channel,
        sku: model.sku,
        attributes,
        feed_status: model.feed_status,
        sync_status: model.sync_status,
        remote_id: model.remote_id,
        last_error: model.last_error,
        last_synced_at: model.last_synced_at.map(|t| t.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn count_to_db(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn count_from_db(n: i32) -> usize {
    usize::try_from(n).unwrap_or_default()
}

fn cycle_from_model(model: CycleRunModel) -> CycleRecord {
    CycleRecord {
        channel: model.channel,
        outcome: model.outcome,
        single_sku: model.single_sku,
        dry_run: model.dry_run,
        inserted: count_from_db(model.inserted),
        updated: count_from_db(model.updated),
        deactivated: count_from_db(model.deactivated),
        reactivated: count_from_db(model.reactivated),
        purged: count_from_db(model.purged),
        failed: count_from_db(model.failed),
        detail: model.detail,
        started_at: model.started_at.with_timezone(&Utc),
        finished_at: model.finished_at.with_timezone(&Utc),
    }
}

#[async_trait]
impl MirrorStore for DbMirrorStore {
    async fn load(&self, channel: &str) -> Result<MirrorSnapshot> {
        let models = MirrorRecordEntity::find()
            .filter(MirrorRecordColumn::Channel.eq(channel))
            .order_by_asc(MirrorRecordColumn::Sku)
            .all(self.db.as_ref())
            .await?;

        models
            .into_iter()
            .map(|model| record_from_model(model).map(|record| (record.sku.clone(), record)))
            .collect()
    }

    async fn upsert(&self, record: &MirrorRecord) -> Result<()> {
        let now = Utc::now().fixed_offset();

        let model = MirrorRecordActiveModel {
            id: Set(Uuid::new_v4()),
            channel: Set(record.channel.clone()),
            sku: Set(record.sku.clone()),
            attributes: Set(attributes_to_json(&record.attributes)),
            feed_status: Set(record.feed_status.clone()),
            sync_status: Set(record.sync_status),
            remote_id: Set(record.remote_id.clone()),
            last_error: Set(record.last_error.clone()),
            last_synced_at: Set(record.last_synced_at.map(|t| t.fixed_offset())),
            created_at: Set(record.created_at.fixed_offset()),
            updated_at: Set(now),
        };

        MirrorRecordEntity::insert(model)
            .on_conflict(build_upsert_on_conflict())
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn delete(&self, channel: &str, sku: &str) -> Result<bool> {
        let result = MirrorRecordEntity::delete_many()
            .filter(MirrorRecordColumn::Channel.eq(channel))
            .filter(MirrorRecordColumn::Sku.eq(sku))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn record_cycle(&self, summary: &CycleSummary) -> Result<()> {
        let record = CycleRecord::from(summary);
        let model = CycleRunActiveModel {
            id: Set(Uuid::new_v4()),
            channel: Set(record.channel),
            outcome: Set(record.outcome),
            single_sku: Set(record.single_sku),
            dry_run: Set(record.dry_run),
            inserted: Set(count_to_db(record.inserted)),
            updated: Set(count_to_db(record.updated)),
            deactivated: Set(count_to_db(record.deactivated)),
            reactivated: Set(count_to_db(record.reactivated)),
            purged: Set(count_to_db(record.purged)),
            failed: Set(count_to_db(record.failed)),
            detail: Set(record.detail),
            started_at: Set(record.started_at.fixed_offset()),
            finished_at: Set(record.finished_at.fixed_offset()),
        };
        CycleRun::insert(model).exec(self.db.as_ref()).await?;
        Ok(())
    }

    async fn recent_cycles(&self, channel: &str, limit: u64) -> Result<Vec<CycleRecord>> {
        let models = CycleRun::find()
            .filter(CycleRunColumn::Channel.eq(channel))
            .order_by_desc(CycleRunColumn::StartedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(cycle_from_model).collect())
    }
}
