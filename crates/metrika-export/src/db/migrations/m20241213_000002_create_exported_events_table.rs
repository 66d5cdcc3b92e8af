//! Creates the exported_events table.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExportedEvents::Table)
                    .if_not_exists()
                    .col(text(ExportedEvents::WatchId).not_null())
                    .col(big_integer(ExportedEvents::GoalId).not_null())
                    .col(timestamp_with_time_zone(ExportedEvents::EventTime).not_null())
                    .col(text(ExportedEvents::ClientHash).not_null())
                    .col(text_null(ExportedEvents::SecondaryId))
                    .primary_key(
                        Index::create()
                            .col(ExportedEvents::WatchId)
                            .col(ExportedEvents::GoalId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_exported_events_client_hash")
                    .table(ExportedEvents::Table)
                    .col(ExportedEvents::ClientHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_exported_events_event_time")
                    .table(ExportedEvents::Table)
                    .col(ExportedEvents::EventTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExportedEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ExportedEvents {
    Table,
    WatchId,
    GoalId,
    EventTime,
    ClientHash,
    SecondaryId,
}
