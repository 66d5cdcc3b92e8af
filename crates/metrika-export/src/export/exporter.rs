//! Orchestration of remote log requests: create, refresh, process, reconcile.
//!
//! Every routine reads its state from the [`EventStore`] and writes back only
//! what it observed, so the routines can run concurrently with each other and
//! the daemon can be restarted at any point.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::{EventStore, ExportedEvent, LogProcess, LogProcessStatus};
use crate::error::Result;
use crate::metrika::{LogRequestParams, LogsApi};

use super::backfill::transform;
use super::parser::TsvParser;
use super::state::{next_step, NextStep};

/// Status queries in flight at once during a refresh.
const REFRESH_CONCURRENCY: usize = 8;

/// Inclusive date range requested from the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExportWindow {
    /// The two days ending yesterday, relative to `today`.
    pub fn lookback(today: NaiveDate) -> Self {
        let end = today - Days::new(1);
        Self {
            start: end - Days::new(1),
            end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A log process for the window is already known; nothing was requested.
    AlreadyExists,
    Created(i64),
}

/// Result of driving one log process one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do this tick.
    Idle,
    PartStored { part: i32, events: u64 },
    /// The part could not be downloaded, parsed or stored. Progress was not
    /// advanced, so the same part is retried next tick.
    PartFailed { part: i32 },
    Cleaned { status: LogProcessStatus },
    /// The process is in a terminal state.
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct Exporter {
    api: Arc<dyn LogsApi>,
    store: EventStore,
    parser: TsvParser,
    /// Request id driven by the previous process tick. Held for the whole
    /// tick, so it also keeps process ticks from overlapping.
    last_processed: Mutex<Option<i64>>,
}

impl Exporter {
    pub fn new(api: Arc<dyn LogsApi>, store: EventStore, parser: TsvParser) -> Self {
        Self {
            api,
            store,
            parser,
            last_processed: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Upserts every log request the remote side knows about. Local progress
    /// on already known requests is kept.
    pub async fn reconcile(&self) -> Result<u64> {
        let requests = self.api.list_log_requests().await?;
        let processes: Vec<LogProcess> = requests.iter().map(|r| r.to_log_process()).collect();
        let affected = self.store.upsert_log_processes(&processes).await?;

        info!(
            remote = requests.len(),
            affected, "Reconciled log processes with remote"
        );
        Ok(affected)
    }

    /// Requests the standard lookback window if it has not been requested yet.
    pub async fn create_tick(&self) -> Result<CreateOutcome> {
        self.create_for_window(ExportWindow::lookback(Utc::now().date_naive()))
            .await
    }

    pub async fn create_for_window(&self, window: ExportWindow) -> Result<CreateOutcome> {
        if self
            .store
            .log_process_exists(window.start, window.end)
            .await?
        {
            debug!(start = %window.start, end = %window.end, "Log request already exists");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let request = self
            .api
            .create_log_request(&LogRequestParams::hits(window.start, window.end))
            .await?;

        // Keyed on the window we asked for so the existence check matches next time.
        let process = LogProcess {
            range_start: window.start,
            range_end: window.end,
            ..request.to_log_process()
        };
        self.store.save_log_process(&process).await?;

        info!(
            request_id = process.request_id,
            start = %window.start,
            end = %window.end,
            status = %process.status,
            "Created log request"
        );
        Ok(CreateOutcome::Created(process.request_id))
    }

    /// Pulls status and part count for every non-terminal log process.
    ///
    /// A failed status query only skips that process; store errors abort.
    pub async fn refresh_statuses(&self) -> Result<RefreshSummary> {
        let active: Vec<LogProcess> = self
            .store
            .list_log_processes()
            .await?
            .into_iter()
            .filter(|p| !p.status.is_terminal())
            .collect();

        let results: Vec<_> = stream::iter(active)
            .map(|process| {
                let api = Arc::clone(&self.api);
                async move {
                    let state = api.log_request_status(process.request_id).await;
                    (process, state)
                }
            })
            .buffer_unordered(REFRESH_CONCURRENCY)
            .collect()
            .await;

        let mut summary = RefreshSummary {
            checked: results.len(),
            ..Default::default()
        };

        for (process, state) in results {
            let state = match state {
                Ok(state) => state,
                Err(e) => {
                    warn!(request_id = process.request_id, error = %e, "Failed to query log request status");
                    summary.failed += 1;
                    continue;
                }
            };

            let total_parts = state.total_parts();
            if state.status == process.status && total_parts == process.total_parts {
                continue;
            }

            self.store
                .update_remote_state(process.request_id, state.status, total_parts)
                .await?;
            info!(
                request_id = process.request_id,
                from = %process.status,
                to = %state.status,
                total_parts,
                "Log request state changed"
            );
            summary.updated += 1;
        }

        Ok(summary)
    }

    /// Drives one processed log process one step, taking them in turn by
    /// request id so a job that keeps failing cannot starve the others.
    ///
    /// Returns `Idle` without touching anything if another process tick is
    /// still running.
    pub async fn process_tick(&self) -> Result<StepOutcome> {
        let Ok(mut last_processed) = self.last_processed.try_lock() else {
            debug!("Process tick skipped: previous tick still running");
            return Ok(StepOutcome::Idle);
        };

        let next = match *last_processed {
            Some(after) => {
                self.store
                    .first_log_process_with_status_after(LogProcessStatus::Processed, after)
                    .await?
            }
            None => None,
        };
        let next = match next {
            Some(process) => Some(process),
            None => {
                self.store
                    .first_log_process_with_status(LogProcessStatus::Processed)
                    .await?
            }
        };

        match next {
            Some(process) => {
                *last_processed = Some(process.request_id);
                self.step(&process).await
            }
            None => Ok(StepOutcome::Idle),
        }
    }

    pub async fn step(&self, process: &LogProcess) -> Result<StepOutcome> {
        match next_step(process) {
            NextStep::Wait => {
                debug!(
                    request_id = process.request_id,
                    status = %process.status,
                    total_parts = process.total_parts,
                    "Log request not ready"
                );
                Ok(StepOutcome::Idle)
            }
            NextStep::ProcessPart(part) => Ok(self.process_part(process, part).await),
            NextStep::Cleanup => self.cleanup(process).await,
            NextStep::Done => Ok(StepOutcome::Finished),
        }
    }

    async fn process_part(&self, process: &LogProcess, part: i32) -> StepOutcome {
        let request_id = process.request_id;
        match self.store_part(request_id, part).await {
            Ok(events) => {
                info!(
                    request_id,
                    part,
                    total_parts = process.total_parts,
                    events,
                    "Stored log part"
                );
                StepOutcome::PartStored { part, events }
            }
            Err(e) => {
                warn!(request_id, part, error = %e, "Failed to process log part, retrying next tick");
                StepOutcome::PartFailed { part }
            }
        }
    }

    /// Download, parse, transform and upsert one part, then advance progress.
    async fn store_part(&self, request_id: i64, part: i32) -> Result<u64> {
        let content = self.api.download_part(request_id, part).await?;
        let entries = self.parser.parse(&content)?;
        let events: Vec<ExportedEvent> = transform(&entries);

        self.store.upsert_exported_events(&events).await?;
        self.store.set_last_processed_part(request_id, part).await?;
        Ok(events.len() as u64)
    }

    async fn cleanup(&self, process: &LogProcess) -> Result<StepOutcome> {
        let state = self.api.clean_log_request(process.request_id).await?;

        self.store
            .set_status(process.request_id, state.status)
            .await?;

        info!(
            request_id = process.request_id,
            status = %state.status,
            "Cleaned up log request"
        );
        Ok(StepOutcome::Cleaned {
            status: state.status,
        })
    }
}
