pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod metrika;
pub mod scheduler;
pub mod secrets;

pub use config::{load_config, load_config_from_str, Config};
pub use db::{EventStore, ExportedEvent, LogProcess, LogProcessStatus};
pub use error::{ConfigError, ExportError, Result};
pub use export::{Exporter, ExportWindow, LogEntry, NextStep, StepOutcome, TsvParser};
pub use metrika::{ApiError, LogRequest, LogsApi, MetrikaClient};
pub use scheduler::Scheduler;
pub use secrets::{resolve_secret, SecretError};
