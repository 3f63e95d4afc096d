//! Common re-exports for convenient entity usage.

pub use super::cycle_run::{
    ActiveModel as CycleRunActiveModel, Column as CycleRunColumn, Entity as CycleRun,
    Model as CycleRunModel,
};
pub use super::mirror_record::{
    ActiveModel as MirrorRecordActiveModel, Column as MirrorRecordColumn,
    Entity as MirrorRecordEntity, Model as MirrorRecordModel,
};
pub use super::sync_status::SyncStatus;
