//! Exported event entity: one (hit, goal) pair from a log part.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exported_events")]
pub struct Model {
    /// Hit identifier from the source system.
    #[sea_orm(primary_key, auto_increment = false)]
    pub watch_id: String,
    /// Goal reached by the hit. A hit with several goals yields several rows.
    #[sea_orm(primary_key, auto_increment = false)]
    pub goal_id: i64,
    pub event_time: DateTimeUtc,
    /// Pseudonymous per-visitor hash.
    #[sea_orm(indexed)]
    pub client_hash: String,
    /// External user identifier, carried forward across the visitor's hits.
    pub secondary_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
