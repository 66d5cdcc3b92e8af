//! Turning remote log parts into stored events.

pub mod backfill;
pub mod exporter;
pub mod parser;
pub mod state;

pub use backfill::{transform, SecondaryIdBackfill};
pub use exporter::{CreateOutcome, ExportWindow, Exporter, RefreshSummary, StepOutcome};
pub use parser::{LogEntry, ParseError, TsvParser};
pub use state::{next_step, NextStep};
