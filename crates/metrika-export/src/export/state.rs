//! Decides what the process tick does with a log process.

use crate::db::entities::log_process::NO_PART_PROCESSED;
use crate::db::{LogProcess, LogProcessStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// The remote log is not downloadable yet; look again next tick.
    Wait,
    /// Download, parse and store this part.
    ProcessPart(i32),
    /// Every part is stored: ask the remote side to delete the log.
    Cleanup,
    /// The remote log is gone. Nothing left to do.
    Done,
}

/// Maps the persisted state of a log process to its next action.
///
/// Only statuses observed from the remote side drive this; the state machine
/// never invents a transition of its own.
pub fn next_step(process: &LogProcess) -> NextStep {
    match process.status {
        LogProcessStatus::Processed => {
            if process.total_parts <= 0 {
                NextStep::Wait
            } else if process.is_fully_consumed() {
                NextStep::Cleanup
            } else {
                NextStep::ProcessPart(process.last_processed_part.max(NO_PART_PROCESSED) + 1)
            }
        }
        LogProcessStatus::Created
        | LogProcessStatus::AwaitingRetry
        | LogProcessStatus::ProcessingFailed => NextStep::Wait,
        LogProcessStatus::Canceled
        | LogProcessStatus::CleanedByUser
        | LogProcessStatus::CleanedAutomaticallyAsTooOld => NextStep::Done,
    }
}
