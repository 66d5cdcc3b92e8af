//! Database migrations.

use sea_orm_migration::prelude::*;

mod m20241213_000001_create_log_processes_table;
mod m20241213_000002_create_exported_events_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241213_000001_create_log_processes_table::Migration),
            Box::new(m20241213_000002_create_exported_events_table::Migration),
        ]
    }
}
