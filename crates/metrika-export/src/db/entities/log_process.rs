//! Log process entity: one remote log-export request and how far it was consumed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a log request as reported by the Logs API.
///
/// The wire strings double as the stored column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum LogProcessStatus {
    /// Requested; the remote side is still preparing the log.
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "canceled")]
    Canceled,
    /// Parts are ready for download.
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "cleaned_by_user")]
    CleanedByUser,
    #[sea_orm(string_value = "cleaned_automatically_as_too_old")]
    CleanedAutomaticallyAsTooOld,
    #[sea_orm(string_value = "processing_failed")]
    ProcessingFailed,
    #[sea_orm(string_value = "awaiting_retry")]
    AwaitingRetry,
}

impl LogProcessStatus {
    /// Remote data is gone for good; the row is kept only as an audit record.
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Canceled | Self::CleanedByUser | Self::CleanedAutomaticallyAsTooOld => true,
            Self::Created | Self::Processed | Self::ProcessingFailed | Self::AwaitingRetry => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Canceled => "canceled",
            Self::Processed => "processed",
            Self::CleanedByUser => "cleaned_by_user",
            Self::CleanedAutomaticallyAsTooOld => "cleaned_automatically_as_too_old",
            Self::ProcessingFailed => "processing_failed",
            Self::AwaitingRetry => "awaiting_retry",
        }
    }
}

impl std::fmt::Display for LogProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker for "no part consumed yet".
pub const NO_PART_PROCESSED: i32 = -1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "log_processes")]
pub struct Model {
    /// Request id assigned by the Logs API.
    #[sea_orm(primary_key, auto_increment = false)]
    pub request_id: i64,
    /// First day covered (inclusive).
    pub range_start: Date,
    /// Last day covered (inclusive).
    pub range_end: Date,
    #[sea_orm(indexed)]
    pub status: LogProcessStatus,
    /// Number of downloadable parts reported by the remote side.
    #[sea_orm(default_value = 0)]
    pub total_parts: i32,
    /// Index of the last part upserted into the event store, or -1.
    #[sea_orm(default_value = -1)]
    pub last_processed_part: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True once every reported part has been consumed.
    pub fn is_fully_consumed(&self) -> bool {
        self.total_parts > 0 && self.last_processed_part >= self.total_parts - 1
    }
}
