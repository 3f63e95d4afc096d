//! Initial migration to create the feedsync database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_mirror_records(manager).await?;
        self.create_cycle_runs(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CycleRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MirrorRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_mirror_records(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MirrorRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MirrorRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // Identity
                    .col(ColumnDef::new(MirrorRecords::Channel).string().not_null())
                    .col(ColumnDef::new(MirrorRecords::Sku).string().not_null())
                    // Synced state
                    .col(
                        ColumnDef::new(MirrorRecords::Attributes)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(MirrorRecords::FeedStatus)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MirrorRecords::SyncStatus)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(MirrorRecords::RemoteId).string().null())
                    // Diagnostics
                    .col(ColumnDef::new(MirrorRecords::LastError).text().null())
                    // Timestamps
                    .col(
                        ColumnDef::new(MirrorRecords::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MirrorRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MirrorRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One record per SKU per channel partition
        manager
            .create_index(
                Index::create()
                    .name("idx_mirror_records_channel_sku")
                    .table(MirrorRecords::Table)
                    .col(MirrorRecords::Channel)
                    .col(MirrorRecords::Sku)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mirror_records_channel_status")
                    .table(MirrorRecords::Table)
                    .col(MirrorRecords::Channel)
                    .col(MirrorRecords::SyncStatus)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mirror_records_remote_id")
                    .table(MirrorRecords::Table)
                    .col(MirrorRecords::Channel)
                    .col(MirrorRecords::RemoteId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_cycle_runs(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CycleRuns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CycleRuns::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CycleRuns::Channel).string().not_null())
                    .col(ColumnDef::new(CycleRuns::Outcome).string().not_null())
                    .col(ColumnDef::new(CycleRuns::SingleSku).string().null())
                    .col(
                        ColumnDef::new(CycleRuns::DryRun)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::Inserted)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::Updated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::Deactivated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::Reactivated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::Purged)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::Failed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CycleRuns::Detail).text().null())
                    .col(
                        ColumnDef::new(CycleRuns::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CycleRuns::FinishedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cycle_runs_channel_started")
                    .table(CycleRuns::Table)
                    .col(CycleRuns::Channel)
                    .col((CycleRuns::StartedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum MirrorRecords {
    Table,
    Id,
    Channel,
    Sku,
    Attributes,
    FeedStatus,
    SyncStatus,
    RemoteId,
    LastError,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CycleRuns {
    Table,
    Id,
    Channel,
    Outcome,
    SingleSku,
    DryRun,
    Inserted,
    Updated,
    Deactivated,
    Reactivated,
    Purged,
    Failed,
    Detail,
    StartedAt,
    FinishedAt,
}
