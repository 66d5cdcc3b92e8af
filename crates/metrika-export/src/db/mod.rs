//! Persistent storage for log processes and exported events.
//!
//! SeaORM over Postgres in production; tests run the same migrations
//! against in-memory SQLite.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

pub mod entities;
pub mod error;
pub mod migrations;
pub mod store;

pub use entities::exported_event::Model as ExportedEvent;
pub use entities::log_process::Model as LogProcess;
pub use entities::LogProcessStatus;
pub use error::DatabaseError;
pub use migrations::Migrator;
pub use store::EventStore;

/// Connects to the database at `url` and applies all pending migrations.
pub async fn init_database(
    url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DatabaseError> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let conn = Database::connect(options).await?;
    Migrator::up(&conn, None)
        .await
        .map_err(DatabaseError::Migration)?;

    tracing::info!("Database connected and migrations applied");
    Ok(conn)
}

/// Opens a migrated in-memory SQLite database. Used by tests.
pub async fn init_in_memory() -> Result<DatabaseConnection, DatabaseError> {
    // Every pooled SQLite connection would get its own empty memory database.
    init_database("sqlite::memory:", 1).await
}
