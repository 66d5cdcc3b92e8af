//! Event store: the only component that touches `log_processes` and
//! `exported_events` directly.

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};

use super::entities::{exported_event, log_process, ExportedEventEntity, LogProcessEntity};
use super::{DatabaseError, ExportedEvent, LogProcess, LogProcessStatus};

/// Rows per INSERT statement. Five columns per row keeps a chunk far below
/// the Postgres limit of 65535 bind parameters.
const EVENT_UPSERT_CHUNK_SIZE: usize = 1000;

/// Handle to the event store. Cloning is cheap (the connection is a pool).
#[derive(Clone, Debug)]
pub struct EventStore {
    db: DatabaseConnection,
}

impl EventStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// True if a log process covering exactly this date window is known.
    pub async fn log_process_exists(
        &self,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<bool, DatabaseError> {
        let count = LogProcessEntity::find()
            .filter(log_process::Column::RangeStart.eq(range_start))
            .filter(log_process::Column::RangeEnd.eq(range_end))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_log_process(
        &self,
        request_id: i64,
    ) -> Result<Option<LogProcess>, DatabaseError> {
        Ok(LogProcessEntity::find_by_id(request_id).one(&self.db).await?)
    }

    /// All log processes in `status`, ordered by request id.
    pub async fn find_log_processes_by_status(
        &self,
        status: LogProcessStatus,
    ) -> Result<Vec<LogProcess>, DatabaseError> {
        Ok(LogProcessEntity::find()
            .filter(log_process::Column::Status.eq(status))
            .order_by_asc(log_process::Column::RequestId)
            .all(&self.db)
            .await?)
    }

    /// The log process with the lowest request id in `status`, if any.
    pub async fn first_log_process_with_status(
        &self,
        status: LogProcessStatus,
    ) -> Result<Option<LogProcess>, DatabaseError> {
        Ok(LogProcessEntity::find()
            .filter(log_process::Column::Status.eq(status))
            .order_by_asc(log_process::Column::RequestId)
            .one(&self.db)
            .await?)
    }

    /// The log process with the lowest request id above `after` in `status`.
    pub async fn first_log_process_with_status_after(
        &self,
        status: LogProcessStatus,
        after: i64,
    ) -> Result<Option<LogProcess>, DatabaseError> {
        Ok(LogProcessEntity::find()
            .filter(log_process::Column::Status.eq(status))
            .filter(log_process::Column::RequestId.gt(after))
            .order_by_asc(log_process::Column::RequestId)
            .one(&self.db)
            .await?)
    }

    pub async fn list_log_processes(&self) -> Result<Vec<LogProcess>, DatabaseError> {
        Ok(LogProcessEntity::find()
            .order_by_asc(log_process::Column::RequestId)
            .all(&self.db)
            .await?)
    }

    /// Inserts or fully overwrites a single log process.
    pub async fn save_log_process(&self, process: &LogProcess) -> Result<(), DatabaseError> {
        LogProcessEntity::insert(process.clone().into_active_model())
            .on_conflict(
                OnConflict::column(log_process::Column::RequestId)
                    .update_columns([
                        log_process::Column::RangeStart,
                        log_process::Column::RangeEnd,
                        log_process::Column::Status,
                        log_process::Column::TotalParts,
                        log_process::Column::LastProcessedPart,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Upserts log processes keyed by request id, writing only the columns the
    /// remote side owns. Local consumption progress of known rows is kept;
    /// new rows start at the column default of -1.
    pub async fn upsert_log_processes(
        &self,
        processes: &[LogProcess],
    ) -> Result<u64, DatabaseError> {
        let deduped = dedup_last_wins(processes, |p| p.request_id);
        if deduped.is_empty() {
            return Ok(0);
        }

        let models = deduped.into_iter().map(|p| log_process::ActiveModel {
            request_id: Set(p.request_id),
            range_start: Set(p.range_start),
            range_end: Set(p.range_end),
            status: Set(p.status),
            total_parts: Set(p.total_parts),
            last_processed_part: NotSet,
        });

        let affected = LogProcessEntity::insert_many(models)
            .on_conflict(
                OnConflict::column(log_process::Column::RequestId)
                    .update_columns([
                        log_process::Column::RangeStart,
                        log_process::Column::RangeEnd,
                        log_process::Column::Status,
                        log_process::Column::TotalParts,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(affected)
    }

    /// Writes the status and part count reported by the remote side without
    /// touching `last_processed_part`. Returns false if the row is unknown.
    pub async fn update_remote_state(
        &self,
        request_id: i64,
        status: LogProcessStatus,
        total_parts: i32,
    ) -> Result<bool, DatabaseError> {
        let result = LogProcessEntity::update_many()
            .set(log_process::ActiveModel {
                status: Set(status),
                total_parts: Set(total_parts),
                ..Default::default()
            })
            .filter(log_process::Column::RequestId.eq(request_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Writes only `status`. Returns false if the row is unknown.
    pub async fn set_status(
        &self,
        request_id: i64,
        status: LogProcessStatus,
    ) -> Result<bool, DatabaseError> {
        let result = LogProcessEntity::update_many()
            .set(log_process::ActiveModel {
                status: Set(status),
                ..Default::default()
            })
            .filter(log_process::Column::RequestId.eq(request_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Records `part` as the highest stored part. Only `last_processed_part`
    /// is written so a concurrent refresh cannot be overwritten.
    pub async fn set_last_processed_part(
        &self,
        request_id: i64,
        part: i32,
    ) -> Result<bool, DatabaseError> {
        let result = LogProcessEntity::update_many()
            .set(log_process::ActiveModel {
                last_processed_part: Set(part),
                ..Default::default()
            })
            .filter(log_process::Column::RequestId.eq(request_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Upserts events keyed by (watch id, goal id) in a single transaction.
    ///
    /// Duplicate keys within `events` collapse to their last occurrence, so one
    /// statement never touches the same row twice.
    pub async fn upsert_exported_events(
        &self,
        events: &[ExportedEvent],
    ) -> Result<u64, DatabaseError> {
        let deduped = dedup_last_wins(events, |e| (e.watch_id.clone(), e.goal_id));
        if deduped.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin().await?;
        let mut affected = 0;
        for chunk in deduped.chunks(EVENT_UPSERT_CHUNK_SIZE) {
            affected += ExportedEventEntity::insert_many(
                chunk.iter().map(|e| (*e).clone().into_active_model()),
            )
            .on_conflict(
                OnConflict::columns([
                    exported_event::Column::WatchId,
                    exported_event::Column::GoalId,
                ])
                .update_columns([
                    exported_event::Column::EventTime,
                    exported_event::Column::ClientHash,
                    exported_event::Column::SecondaryId,
                ])
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
        }
        txn.commit().await?;

        Ok(affected)
    }

    pub async fn find_exported_event(
        &self,
        watch_id: &str,
        goal_id: i64,
    ) -> Result<Option<ExportedEvent>, DatabaseError> {
        Ok(ExportedEventEntity::find_by_id((watch_id.to_owned(), goal_id))
            .one(&self.db)
            .await?)
    }

    pub async fn count_exported_events(&self) -> Result<u64, DatabaseError> {
        Ok(ExportedEventEntity::find().count(&self.db).await?)
    }
}

/// Keeps the last occurrence of every key, in first-seen key order.
fn dedup_last_wins<T, K, F>(items: &[T], key: F) -> Vec<&T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<&T> = Vec::with_capacity(items.len());
    for item in items {
        match positions.get(&key(item)) {
            Some(&idx) => out[idx] = item,
            None => {
                positions.insert(key(item), out.len());
                out.push(item);
            }
        }
    }
    out
}
