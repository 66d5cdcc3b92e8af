//! Creates the log_processes table.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LogProcesses::Table)
                    .if_not_exists()
                    .col(big_integer(LogProcesses::RequestId).primary_key())
                    .col(date(LogProcesses::RangeStart).not_null())
                    .col(date(LogProcesses::RangeEnd).not_null())
                    .col(text(LogProcesses::Status).not_null())
                    .col(integer(LogProcesses::TotalParts).not_null().default(0))
                    .col(integer(LogProcesses::LastProcessedPart).not_null().default(-1))
                    .to_owned(),
            )
            .await?;

        // The process tick selects by status on every run
        manager
            .create_index(
                Index::create()
                    .name("idx_log_processes_status")
                    .table(LogProcesses::Table)
                    .col(LogProcesses::Status)
                    .to_owned(),
            )
            .await?;

        // Existence check for a date window before creating a request
        manager
            .create_index(
                Index::create()
                    .name("idx_log_processes_range")
                    .table(LogProcesses::Table)
                    .col(LogProcesses::RangeStart)
                    .col(LogProcesses::RangeEnd)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LogProcesses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LogProcesses {
    Table,
    RequestId,
    RangeStart,
    RangeEnd,
    Status,
    TotalParts,
    LastProcessedPart,
}
